//! Errors surfaced to the UI by the session manager and the sync engine.

use api::TransportError;

/// Why a session or note operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Rejected locally before reaching the server.
    #[error("{0}")]
    Validation(String),
    /// The server refused a sign-in or sign-up.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// No session, or the server no longer accepts the session's token.
    #[error("not signed in")]
    Unauthorized,
    #[error("note not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: {0}")]
    Server(String),
    /// Another sign-in, sign-up or verification is already outstanding.
    #[error("another authentication request is in progress")]
    Busy,
    /// A full resynchronisation failed; the cache was left untouched.
    #[error("refresh failed: {0}")]
    RefreshFailed(Box<SyncError>),
    /// The operation was discarded by a logout or `cancel_all` before its
    /// result could be applied.
    #[error("operation cancelled")]
    Cancelled,
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unauthorized(_) => Self::Unauthorized,
            TransportError::NotFound(detail) => Self::NotFound(detail),
            TransportError::ValidationFailed(detail) => Self::Validation(detail),
            TransportError::Network(detail) => Self::Network(detail),
            TransportError::Server(detail) => Self::Server(detail),
        }
    }
}
