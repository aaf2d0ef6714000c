use thiserror::Error;

use crate::transport::Method;

/// Errors that can occur when talking to the confirming system.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side answered with a non-success status.
    #[error("{method} {path} failed with status {status}: {message}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        message: String,
    },

    /// The request could not be delivered.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The transport refused the request without contacting a remote.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
