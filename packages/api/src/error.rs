//! Transport failure taxonomy.

/// Why a transport call failed.
///
/// The message carried by each variant is the server's `detail` when one was
/// returned, or a description of the local failure otherwise.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Missing, expired or rejected credentials (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The addressed resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),
    /// The server rejected the payload (HTTP 400/409/422).
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// The server could not be reached or did not answer in time.
    #[error("network error: {0}")]
    Network(String),
    /// Any other failure on the server side, including undecodable responses.
    #[error("server error: {0}")]
    Server(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Map a non-success HTTP status to an error, keeping the server's detail.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {status}"));
        match status {
            401 | 403 => Self::Unauthorized(detail),
            404 => Self::NotFound(detail),
            400 | 409 | 422 => Self::ValidationFailed(detail),
            _ => Self::Server(detail),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
