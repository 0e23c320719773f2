use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use course_axum::{HandlerResult, RequestParams};
use course_core::{Course, CourseError, PointerSlot};
use serde_json::{json, Value};

use crate::state::PipelineState;

fn course_from_body(body: Result<Json<Value>, JsonRejection>) -> HandlerResult<Course> {
    let Json(value) = body?;
    if !value.is_object() {
        return Err(CourseError::invalid_course("Course body must be a JSON object").into());
    }
    serde_json::from_value(value).map_err(|e| CourseError::invalid_course(format!("Malformed course: {e}")).into())
}

fn slot_from_mode(mode: Option<&str>) -> Result<PointerSlot, CourseError> {
    match mode {
        None | Some("draft") => Ok(PointerSlot::Draft),
        Some("published") | Some("publish") => Ok(PointerSlot::Published),
        Some(other) => Err(CourseError::validation(format!(
            "Unknown mode '{other}' (expected draft or published)"
        ))),
    }
}

/// `POST /api/courses/checkpoint?courseId=&expectedVersion=`
pub async fn checkpoint(
    State(state): State<PipelineState>,
    params: RequestParams,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult<Json<Value>> {
    let course_id = params.required("courseId")?;
    let expected = params.parse::<u64>("expectedVersion")?;
    let course = course_from_body(body)?;

    let outcome = state.snapshots.checkpoint(course_id, course, expected).await?;
    Ok(Json(outcome.to_json()))
}

/// `POST /api/courses/publish?courseId=&expectedVersion=`
pub async fn publish(
    State(state): State<PipelineState>,
    params: RequestParams,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResult<Json<Value>> {
    let course_id = params.required("courseId")?;
    let expected = params.parse::<u64>("expectedVersion")?;
    let course = course_from_body(body)?;

    let outcome = state.snapshots.publish(course_id, course, expected).await?;
    Ok(Json(outcome.to_json()))
}

/// `GET /api/courses/{course_id}/snapshot?mode=draft|published`
pub async fn snapshot(
    State(state): State<PipelineState>,
    Path(course_id): Path<String>,
    params: RequestParams,
) -> HandlerResult<Json<Value>> {
    let slot = slot_from_mode(params.optional("mode"))?;
    let view = state.snapshots.load(&course_id, slot).await?;
    let mut body = serde_json::to_value(view).map_err(|e| CourseError::general_error(e.to_string()))?;
    body["success"] = json!(true);
    Ok(Json(body))
}

/// `GET /api/courses/{course_id}/pointers`
pub async fn pointers(State(state): State<PipelineState>, Path(course_id): Path<String>) -> HandlerResult<Json<Value>> {
    let record = state.snapshots.pointers(&course_id).await?;
    let status = record.derived_status();
    let mut body = serde_json::to_value(record).map_err(|e| CourseError::general_error(e.to_string()))?;
    body["status"] = json!(status.as_str());
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_draft() {
        assert_eq!(slot_from_mode(None).unwrap(), PointerSlot::Draft);
        assert_eq!(slot_from_mode(Some("published")).unwrap(), PointerSlot::Published);
        assert!(slot_from_mode(Some("latest")).is_err());
    }
}
