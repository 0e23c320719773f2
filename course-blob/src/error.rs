use course_core::CourseError;
use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {id}")]
    NotFound { id: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Invalid course: {message}")]
    InvalidCourse { message: String },

    #[error("Upload session not found: {upload_id}")]
    UploadNotFound { upload_id: String },

    #[error("Upload incomplete: received {received} of {expected} chunks")]
    Incomplete { expected: u32, received: u32 },

    #[error("Missing chunk {index}")]
    MissingChunk { index: u32 },

    #[error("Corrupt payload: {reason}")]
    Corrupt { reason: String },

    #[error("Payload too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn invalid_course<S: Into<String>>(message: S) -> Self {
        Self::InvalidCourse {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn upload_not_found<S: Into<String>>(upload_id: S) -> Self {
        Self::UploadNotFound {
            upload_id: upload_id.into(),
        }
    }

    pub fn corrupt<S: Into<String>>(reason: S) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    pub fn upload_failed<S: Into<String>>(reason: S) -> Self {
        Self::UploadFailed {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::UploadNotFound { .. })
    }
}

impl From<BlobError> for CourseError {
    fn from(err: BlobError) -> Self {
        let message = err.to_string();
        let mapped = match &err {
            BlobError::NotFound { .. } | BlobError::UploadNotFound { .. } => {
                CourseError::not_found(message)
            }
            BlobError::Invalid { .. } => CourseError::validation(message),
            BlobError::InvalidCourse { .. } => CourseError::invalid_course(message),
            BlobError::Incomplete { expected, received } => CourseError::incomplete_upload(message)
                .with_details(format!("expected={expected} received={received}")),
            BlobError::MissingChunk { index } => {
                CourseError::missing_chunk(message).with_details(format!("chunk_index={index}"))
            }
            BlobError::Corrupt { .. } | BlobError::Serialization { .. } => {
                CourseError::corrupt_payload(message)
            }
            BlobError::TooLarge { .. } => CourseError::payload_too_large(message),
            BlobError::UploadFailed { .. } | BlobError::Backend { .. } | BlobError::Io { .. } => {
                CourseError::upload(message)
            }
        };
        mapped.with_source(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::ErrorKind;

    #[test]
    fn maps_onto_the_course_taxonomy() {
        let cases = [
            (BlobError::not_found("f1"), ErrorKind::NotFound),
            (BlobError::upload_not_found("upl_1"), ErrorKind::NotFound),
            (BlobError::invalid("x"), ErrorKind::Validation),
            (BlobError::invalid_course("x"), ErrorKind::InvalidCourse),
            (BlobError::Incomplete { expected: 3, received: 2 }, ErrorKind::IncompleteUpload),
            (BlobError::MissingChunk { index: 1 }, ErrorKind::MissingChunk),
            (BlobError::corrupt("bad gzip"), ErrorKind::CorruptPayload),
            (BlobError::TooLarge { size: 2, max: 1 }, ErrorKind::PayloadTooLarge),
            (BlobError::upload_failed("telegram down"), ErrorKind::Upload),
        ];
        for (err, kind) in cases {
            assert_eq!(CourseError::from(err).kind, kind);
        }
    }

    #[test]
    fn missing_chunk_names_the_index() {
        let err = CourseError::from(BlobError::MissingChunk { index: 4 });
        assert_eq!(err.details.as_deref(), Some("chunk_index=4"));
        assert_eq!(err.message, "Missing chunk 4");
    }
}
