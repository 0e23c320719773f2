use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use course_core::CourseError;

#[derive(Debug)]
pub struct CourseAxumError(pub anyhow::Error);

impl From<anyhow::Error> for CourseAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<CourseError> for CourseAxumError {
    fn from(e: CourseError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<JsonRejection> for CourseAxumError {
    fn from(rejection: JsonRejection) -> Self {
        CourseError::validation("Failed to parse the request body as JSON")
            .with_details(rejection.body_text())
            .into()
    }
}

impl From<QueryRejection> for CourseAxumError {
    fn from(rejection: QueryRejection) -> Self {
        CourseError::validation("Invalid query string")
            .with_details(rejection.body_text())
            .into()
    }
}

impl IntoResponse for CourseAxumError {
    fn into_response(self) -> Response {
        // Keep the structured fields when a CourseError sits anywhere in the chain
        let response = |err: &CourseError| {
            if err.kind.is_server_error() {
                tracing::error!(name = err.name(), error = ?self.0, "Request failed");
            }
            let safe = err.sanitize_for_client();
            let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(safe.to_json())).into_response()
        };

        if let Some(course) = CourseError::from_anyhow(&self.0) {
            return response(course);
        }

        response(&CourseError::general_error(self.0.to_string()))
    }
}

pub type HandlerResult<T> = Result<T, CourseAxumError>;
