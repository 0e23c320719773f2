mod courses;
mod ops;
mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::PipelineState;

/// Every pipeline route, bound to `state`.
pub fn router(state: PipelineState) -> Router {
    let body_limit = state
        .settings
        .max_blob_bytes
        .max(state.settings.upload_rules.max_chunk_bytes);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/courses/checkpoint", post(courses::checkpoint))
        .route("/api/courses/publish", post(courses::publish))
        .route("/api/courses/upload-chunked", post(uploads::upload_chunked))
        .route("/api/courses/{course_id}/snapshot", get(courses::snapshot))
        .route("/api/courses/{course_id}/pointers", get(courses::pointers))
        .route("/api/admin/migrate-base64", post(ops::migrate_base64))
        .route("/api/cron/sync-courses", get(ops::sync_courses))
        .route("/api/sync/pending", get(ops::pending))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
