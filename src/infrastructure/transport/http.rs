use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::sse::{SseDecoder, SseFrame};
use crate::domain::errors::TransportError;
use crate::domain::ports::{NotificationTransport, PushStream};
use crate::models::{NotificationRecord, PushEvent};

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Deserialize)]
struct NotificationListResponse {
    notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct MarkReadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MarkAllReadResponse {
    count: u64,
}

/// Notification service over HTTP: JSON requests plus an SSE push channel
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    stream_client: Client,
    endpoint: Url,
    access_key: String,
}

impl HttpTransport {
    /// `timeout` bounds one-shot requests; the push channel only has a connect timeout
    pub fn new(endpoint: &str, access_key: &str, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        let stream_client = Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            stream_client,
            endpoint,
            access_key: access_key.to_string(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) if body.len() > 500 => body.chars().take(500).collect(),
            Ok(body) => body,
            Err(_) => String::new(),
        };
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn decode_frame(frame: SseFrame) -> Result<PushEvent, TransportError> {
    serde_json::from_str(&frame.data)
        .map_err(|e| TransportError::Decode(format!("push event {:?}: {}", frame.id, e)))
}

#[async_trait]
impl NotificationTransport for HttpTransport {
    async fn fetch_notifications(&self, locale: &str) -> Result<Vec<NotificationRecord>, TransportError> {
        let url = self.url(&["notifications"])?;
        debug!("Fetching notifications from {}", url);

        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.access_key.as_str())
            .query(&[("locale", locale)])
            .send()
            .await?;

        let list: NotificationListResponse = Self::check(response).await?.json().await?;
        Ok(list.notifications)
    }

    async fn subscribe(&self, user_id: &str, locale: &str) -> Result<PushStream, TransportError> {
        let url = self.url(&["notifications", "stream"])?;

        let response = self
            .stream_client
            .get(url)
            .header(API_KEY_HEADER, self.access_key.as_str())
            .header("Accept", "text/event-stream")
            .query(&[("userId", user_id), ("locale", locale)])
            .send()
            .await?;
        let response = Self::check(response).await?;
        info!("Push channel open for user {}", user_id);

        let bytes = Box::pin(response.bytes_stream());
        let stream = futures::stream::unfold(
            (bytes, SseDecoder::new(), VecDeque::new(), false),
            |(mut bytes, mut decoder, mut pending, mut finished)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (bytes, decoder, pending, finished)));
                    }
                    if finished {
                        return None;
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => match decoder.feed(&chunk) {
                            Ok(frames) => pending.extend(frames.into_iter().map(decode_frame)),
                            Err(e) => {
                                // Mid-line position is lost; end the channel after reporting
                                warn!("Push channel dropped: {}", e);
                                finished = true;
                                pending.push_back(Err(e));
                            }
                        },
                        Some(Err(e)) => {
                            warn!("Push channel read failed: {}", e);
                            return Some((Err(TransportError::from(e)), (bytes, decoder, pending, finished)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    async fn mark_as_read(&self, id: &str) -> Result<String, TransportError> {
        let url = self.url(&["notifications", id, "read"])?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.access_key.as_str())
            .send()
            .await?;

        let ack: MarkReadResponse = Self::check(response).await?.json().await?;
        Ok(ack.id)
    }

    async fn mark_all_as_read(&self) -> Result<u64, TransportError> {
        let url = self.url(&["notifications", "read-all"])?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.access_key.as_str())
            .send()
            .await?;

        let ack: MarkAllReadResponse = Self::check(response).await?.json().await?;
        Ok(ack.count)
    }
}
