//! # Errors
//!
//! The pipeline carries one structured error type through every layer.
//! Core goals:
//! - a stable `name` + status code per failure class
//! - can be carried through `anyhow::Error` so services can use `?` freely
//! - transport-agnostic (the axum crate decides how to serialize)
//!
//! Library crates keep their own `thiserror` enums and convert into
//! [`CourseError`] at their boundary.

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for pipeline APIs.
pub type CourseResult<T> = std::result::Result<T, AnyError>;

/// Failure classes with their HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,        // 400
    InvalidCourse,     // 400
    IncompleteUpload,  // 400
    MissingChunk,      // 400
    CorruptPayload,    // 400
    NotAuthenticated,  // 401
    NotFound,          // 404
    Conflict,          // 409
    PayloadTooLarge,   // 413
    Upload,            // 500
    GeneralError,      // 500
    Unavailable,       // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation
            | ErrorKind::InvalidCourse
            | ErrorKind::IncompleteUpload
            | ErrorKind::MissingChunk
            | ErrorKind::CorruptPayload => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::Upload | ErrorKind::GeneralError => 500,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Stable error `name` reported to clients.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::InvalidCourse => "InvalidCourseError",
            ErrorKind::IncompleteUpload => "IncompleteUploadError",
            ErrorKind::MissingChunk => "MissingChunkError",
            ErrorKind::CorruptPayload => "CorruptPayloadError",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ErrorKind::Upload => "UploadError",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

/// A structured pipeline error that can live inside `anyhow::Error`.
///
/// - kind (name + status code)
/// - message (the `error` field on the wire)
/// - details (optional, the `details` field on the wire)
/// - source (never sent to clients)
#[derive(Debug)]
pub struct CourseError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<String>,
    pub source: Option<AnyError>,
}

impl CourseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Convert into `anyhow::Error` so it flows through `?`.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `CourseError` anywhere in an `anyhow::Error` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&CourseError> {
        err.chain().find_map(|e| e.downcast_ref::<CourseError>())
    }

    /// Turn any error into a CourseError:
    /// - if it's already a CourseError, keep it (lossless)
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> CourseError {
        match err.downcast::<CourseError>() {
            Ok(course) => course,
            Err(other) => {
                CourseError::new(ErrorKind::GeneralError, other.to_string()).with_source(other)
            }
        }
    }

    /// A copy suitable for returning to clients.
    ///
    /// The source chain is always dropped. General errors also lose their
    /// message and details, which are only ever logged server-side.
    pub fn sanitize_for_client(&self) -> CourseError {
        if self.kind == ErrorKind::GeneralError {
            return CourseError::new(ErrorKind::GeneralError, "Internal server error");
        }
        CourseError {
            kind: self.kind,
            message: self.message.clone(),
            details: self.details.clone(),
            source: None,
        }
    }

    /// Wire payload: `{ error, name, code, details? }`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut base = json!({
            "error": self.message,
            "name": self.name(),
            "code": self.code(),
        });
        if let Some(details) = &self.details {
            base["details"] = json!(details);
        }
        base
    }

    // ---- Constructors ----

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }
    pub fn invalid_course(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCourse, msg)
    }
    pub fn incomplete_upload(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::IncompleteUpload, msg)
    }
    pub fn missing_chunk(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingChunk, msg)
    }
    pub fn corrupt_payload(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptPayload, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, msg)
    }
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upload, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl fmt::Display for CourseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for CourseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Early-return with a `CourseError` wrapped in anyhow.
#[macro_export]
macro_rules! bail_course {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::CourseError::$ctor($msg).into_anyhow())
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::CourseError::$ctor(format!($fmt, $($arg)*)).into_anyhow())
    };
}
