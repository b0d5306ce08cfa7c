//! Error types for the AIcebreaker client.

use thiserror::Error;

/// Errors that can occur when using the AIcebreaker client.
#[derive(Debug, Error)]
pub enum AicebreakerError {
    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// Failed to serialize or deserialize a message or request body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A one-shot backend request failed before a response was received.
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered a one-shot request with a non-success status.
    #[error("http status {status} from {path}: {body}")]
    HttpStatus {
        /// Request path relative to the API base address.
        path: &'static str,
        /// Numeric HTTP status code.
        status: u16,
        /// Response body, as text, for logging.
        body: String,
    },

    /// A required configuration value was not supplied.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// A configured base address cannot be used to build a request URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// Attempted an operation that requires an open channel.
    #[error("channel not connected")]
    NotConnected,

    /// A round cannot start while the countdown is still running.
    #[error("round in progress: countdown at {0}")]
    RoundInProgress(i64),

    /// A round start is already waiting on the backend.
    #[error("round start already pending")]
    StartPending,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for AIcebreaker client operations.
pub type Result<T> = std::result::Result<T, AicebreakerError>;
