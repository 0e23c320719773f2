use axum::extract::State;
use axum::Json;
use bytes::Bytes;
use course_axum::{HandlerResult, RequestParams};
use course_blob::Operation;
use course_core::CourseError;
use serde_json::Value;

use crate::state::PipelineState;

/// `init` and `complete` may carry their parameters in a JSON body
/// instead of the query string. Query values win.
fn merge_json_body(mut params: RequestParams, body: &Bytes) -> RequestParams {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return params;
    };
    for (key, value) in fields {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        params.query.entry(key).or_insert(value);
    }
    params
}

/// `POST /api/courses/upload-chunked?action=init|chunk|complete`
pub async fn upload_chunked(
    State(state): State<PipelineState>,
    params: RequestParams,
    body: Bytes,
) -> HandlerResult<Json<Value>> {
    let action = params.required("action")?.to_string();

    let response = match action.as_str() {
        "init" => {
            let params = merge_json_body(params, &body);
            let course_id = params.required("courseId")?;
            let total_chunks = params.parse_required::<u32>("totalChunks")?;
            let operation = params.parse_required::<Operation>("operation")?;
            state.uploads.init(course_id, total_chunks, operation).await?
        }
        "chunk" => {
            let upload_id = params.required("uploadId")?;
            let chunk_index = params.parse_required::<u32>("chunkIndex")?;
            if body.is_empty() {
                return Err(CourseError::validation("Chunk body is empty").into());
            }
            state.uploads.chunk(upload_id, chunk_index, body).await?
        }
        "complete" => {
            let params = merge_json_body(params, &body);
            let upload_id = params.required("uploadId")?;
            let expected = params.parse::<u64>("expectedVersion")?;
            state.uploads.complete(upload_id, expected).await?
        }
        other => {
            return Err(CourseError::validation(format!(
                "Unknown action '{other}' (expected init, chunk or complete)"
            ))
            .into())
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_fields_fill_missing_query_values() {
        let mut params = RequestParams::default();
        params.query.insert("courseId".into(), "from-query".into());
        let body = Bytes::from_static(br#"{"courseId":"from-body","totalChunks":3,"operation":"publish"}"#);

        let merged = merge_json_body(params, &body);
        assert_eq!(merged.required("courseId").unwrap(), "from-query");
        assert_eq!(merged.parse_required::<u32>("totalChunks").unwrap(), 3);
        assert_eq!(merged.required("operation").unwrap(), "publish");
    }

    #[test]
    fn non_json_bodies_are_ignored() {
        let merged = merge_json_body(RequestParams::default(), &Bytes::from_static(b"\x1f\x8b\x08"));
        assert!(merged.query.is_empty());
    }
}
