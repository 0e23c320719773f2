use course_core::{CourseError, PointerStoreError};
use thiserror::Error;

/// Result type for registry operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for the registry and sweeper
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Registry entry not found: {0}")]
    EntryNotFound(String),

    #[error("Registry I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Pointer store error: {0}")]
    Pointer(#[from] PointerStoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        QueueError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::SerializationError(err.to_string())
    }
}

impl From<QueueError> for CourseError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Pointer(inner) => inner.into(),
            QueueError::EntryNotFound(msg) => CourseError::not_found(msg),
            other => CourseError::general_error(other.to_string()),
        }
    }
}
