use thiserror::Error;

/// Errors raised by the feed store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed store used after teardown")]
    InvalidState,
    #[error("Notification not found: {0}")]
    NotFound(String),
    #[error("Notification already in feed: {0}")]
    DuplicateId(String),
    #[error("Replacement for {expected} carries id {found}")]
    IdMismatch { expected: String, found: String },
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Errors raised by a notification transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Transport closed")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Http(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            TransportError::Http(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Errors surfaced by the synchronizer and the read-state mutator.
/// None of these are fatal to the host application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Initial fetch failed: {0}")]
    FetchFailed(String),
    #[error("Mutation failed: {0}")]
    MutationFailed(String),
    #[error("Push channel closed: {0}")]
    ChannelClosed(String),
    #[error(transparent)]
    Store(#[from] FeedError),
}

pub type SyncResult<T> = Result<T, SyncError>;
