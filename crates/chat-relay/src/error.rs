//! Relay error types.

use chatting_service::TransportError;
use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Not connected error
    #[error("Not connected to relay")]
    NotConnected,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No acknowledgement in time
    #[error("Acknowledgement timed out after {0}ms")]
    Timeout(u64),

    /// The relay acknowledged with an error
    #[error("Relay rejected event: {0}")]
    Rejected(String),

    /// Send error
    #[error("Failed to send message: {0}")]
    Send(String),
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

impl From<RelayError> for TransportError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::NotConnected => TransportError::Disconnected,
            RelayError::Timeout(timeout_ms) => TransportError::Timeout { timeout_ms },
            RelayError::Rejected(reason) => TransportError::Rejected(reason),
            other => TransportError::Send(other.to_string()),
        }
    }
}
