//! Transport error types.

use thiserror::Error;

/// Failure of a single transmit-and-acknowledge round trip.
///
/// The coordinator treats every variant the same way: the item is demoted
/// to the offline store and retried on the next reconnect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is down
    #[error("Transport is not connected")]
    Disconnected,

    /// No acknowledgement arrived in time
    #[error("No acknowledgement within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The server acknowledged with an error
    #[error("Server rejected payload: {0}")]
    Rejected(String),

    /// Writing to the connection failed
    #[error("Send failed: {0}")]
    Send(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
