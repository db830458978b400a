//! Error types for the event sink.

use thiserror::Error;

/// Error type covering every failure category in the sink.
///
/// Delivery failures are split between transport-level errors
/// ([`SinkError::Http`]) and non-success HTTP statuses
/// ([`SinkError::Status`]); the sender decides retryability from the
/// variant, not the caller.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network or transport-level HTTP error from reqwest.
    ///
    /// Includes connection failures, timeouts, and TLS errors.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ingestion endpoint returned a non-success HTTP status.
    #[error("endpoint returned {status}: {message}")]
    Status {
        /// The HTTP status code returned by the endpoint.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization of a batch payload failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Compression error while encoding a batch payload.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error (missing or invalid settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// All delivery attempts for a batch failed.
    #[error("delivery failed after {attempts} attempts")]
    RetriesExhausted {
        /// Total number of attempts made, including the first.
        attempts: u32,
    },
}

/// Convenience Result type alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
