use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use notibell::infrastructure::transport::sse::MAX_EVENT_BYTES;
use notibell::models::{NotificationRecord, PushEvent};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

pub const TEST_API_KEY: &str = "test-key";

#[derive(Default)]
pub struct ServerState {
    pub notifications: Vec<NotificationRecord>,
    pub fail_fetch: bool,
    /// Answer the stream with one line longer than the client will buffer
    pub oversized_stream: bool,
    pub api_keys: Vec<String>,
    pub fetch_locales: Vec<String>,
    pub stream_queries: Vec<(String, String)>,
    pub read_ids: Vec<String>,
    pub read_all_calls: usize,
    subscribers: Vec<mpsc::Sender<PushEvent>>,
}

type Shared = Arc<Mutex<ServerState>>;

/// Notification service on a loopback port, serving under `/api`
pub struct MockNotificationServer {
    pub base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockNotificationServer {
    pub async fn start(notifications: Vec<NotificationRecord>) -> Self {
        let state: Shared = Arc::new(Mutex::new(ServerState {
            notifications,
            ..ServerState::default()
        }));

        let api = Router::new()
            .route("/notifications", get(list_notifications))
            .route("/notifications/stream", get(notification_stream))
            .route("/notifications/read-all", post(mark_all_read))
            .route("/notifications/:id/read", post(mark_read))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
            task,
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().expect("server state poisoned")
    }

    pub fn open_streams(&self) -> usize {
        let mut state = self.state();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Send an event down every open stream. Returns how many received it.
    pub async fn push(&self, event: PushEvent) -> usize {
        let subscribers = self.state().subscribers.clone();
        let mut delivered = 0;
        for tx in subscribers {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn close_streams(&self) {
        self.state().subscribers.clear();
    }
}

impl Drop for MockNotificationServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn authorize(state: &Shared, headers: &HeaderMap) -> Result<(), StatusCode> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut state = state.lock().expect("server state poisoned");
    state.api_keys.push(key.clone());
    if key == TEST_API_KEY {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[derive(Deserialize)]
struct LocaleQuery {
    locale: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamQuery {
    user_id: String,
    locale: String,
}

async fn list_notifications(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<LocaleQuery>,
) -> Response {
    if let Err(status) = authorize(&state, &headers) {
        return status.into_response();
    }
    let mut state = state.lock().expect("server state poisoned");
    state.fetch_locales.push(query.locale);
    if state.fail_fetch {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    Json(json!({ "notifications": state.notifications })).into_response()
}

async fn notification_stream(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Response {
    if let Err(status) = authorize(&state, &headers) {
        return status.into_response();
    }
    let (tx, rx) = mpsc::channel::<PushEvent>(100);
    {
        let mut state = state.lock().expect("server state poisoned");
        state.stream_queries.push((query.user_id, query.locale));
        if state.oversized_stream {
            let body = format!("data: {}", "x".repeat(MAX_EVENT_BYTES + 1));
            return ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response();
        }
        state.subscribers.push(tx);
    }

    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(Event::default().event("notification").data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn mark_read(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(status) = authorize(&state, &headers) {
        return status.into_response();
    }
    let mut state = state.lock().expect("server state poisoned");
    state.read_ids.push(id.clone());
    match state.notifications.iter_mut().find(|n| n.id == id) {
        Some(record) => {
            record.read = true;
            Json(json!({ "id": id })).into_response()
        }
        None => (StatusCode::NOT_FOUND, "no such notification").into_response(),
    }
}

async fn mark_all_read(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(status) = authorize(&state, &headers) {
        return status.into_response();
    }
    let mut state = state.lock().expect("server state poisoned");
    state.read_all_calls += 1;
    let mut count = 0u64;
    for record in state.notifications.iter_mut().filter(|n| !n.read) {
        record.read = true;
        count += 1;
    }
    Json(json!({ "count": count })).into_response()
}
