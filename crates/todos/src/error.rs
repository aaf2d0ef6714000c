//! Todo error types.

use common::RecordId;
use record_store::TransportError;
use thiserror::Error;

/// Errors that can occur during todo actions.
#[derive(Debug, Error)]
pub enum TodoError {
    /// No todo exists under the given id.
    #[error("Todo not found: {0}")]
    NotFound(RecordId),

    /// The title is empty after trimming.
    #[error("Todo title must not be empty")]
    InvalidTitle,

    /// The server did not confirm the change; local state was rolled back.
    #[error("Change rejected: {0}")]
    Rejected(#[from] TransportError),
}

/// Result type for todo actions.
pub type Result<T> = std::result::Result<T, TodoError>;
