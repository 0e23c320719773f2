use axum::extract::State;
use axum::Json;
use course_axum::{HandlerResult, RequestParams};
use course_core::CourseError;
use serde_json::{json, Value};

use crate::state::PipelineState;

/// `POST /api/admin/migrate-base64`
pub async fn migrate_base64(State(state): State<PipelineState>, params: RequestParams) -> HandlerResult<Json<Value>> {
    state.admin_guard.check(&params)?;

    let report = state.migration.run().await?;
    let mut body = serde_json::to_value(report).map_err(|e| CourseError::general_error(e.to_string()))?;
    body["success"] = json!(true);
    Ok(Json(body))
}

/// `GET /api/cron/sync-courses`
pub async fn sync_courses(State(state): State<PipelineState>, params: RequestParams) -> HandlerResult<Json<Value>> {
    state.cron_guard.check(&params)?;

    let report = state.sync.sync_pending_courses().await?;
    let body = serde_json::to_value(report).map_err(|e| CourseError::general_error(e.to_string()))?;
    Ok(Json(body))
}

/// `GET /api/sync/pending`
pub async fn pending(State(state): State<PipelineState>) -> HandlerResult<Json<Value>> {
    let pending = state.sync.pending_sync_count().await?;
    Ok(Json(json!({ "success": true, "pending": pending })))
}
