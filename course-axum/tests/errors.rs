use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, Request};
use axum::routing::post;
use axum::Json;
use course_axum::{axum as app, CourseAxumError, RequestParams};
use course_core::CourseError;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn echo(body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, CourseAxumError> {
    let Json(body) = body?;
    Ok(Json(body))
}

async fn conflict() -> Result<Json<Value>, CourseAxumError> {
    Err(CourseError::conflict("Version conflict")
        .with_details("expected=1 actual=2")
        .into())
}

async fn boom() -> Result<Json<Value>, CourseAxumError> {
    Err(anyhow::anyhow!("database password leaked in message").into())
}

async fn needs_course(params: RequestParams) -> Result<Json<Value>, CourseAxumError> {
    let course_id = params.required("courseId")?;
    Ok(Json(json!({ "courseId": course_id })))
}

fn router() -> axum::Router {
    app()
        .route("/echo", post(echo))
        .route("/conflict", post(conflict))
        .route("/boom", post(boom))
        .route("/course", post(needs_course))
        .with_http_layers()
        .router
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let res = router().oneshot(post_json("/echo", "{\"title\":\"x\"")).await.unwrap();

    assert_eq!(res.status().as_u16(), 400);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["name"], "ValidationError");
    assert_eq!(body["code"], 400);
    assert!(body.get("details").is_some());
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let provided = HeaderValue::from_static("req-test-123");
    let mut req = post_json("/echo", "{\"ok\":true}");
    req.headers_mut().insert("x-request-id", provided.clone());

    let res = router().oneshot(req).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn course_error_keeps_status_and_details() {
    let res = router().oneshot(post_json("/conflict", "{}")).await.unwrap();

    assert_eq!(res.status().as_u16(), 409);
    let body = json_body(res).await;
    assert_eq!(body["name"], "ConflictError");
    assert_eq!(body["error"], "Version conflict");
    assert_eq!(body["details"], "expected=1 actual=2");
}

#[tokio::test]
async fn unknown_errors_are_generic_for_clients() {
    let res = router().oneshot(post_json("/boom", "{}")).await.unwrap();

    assert_eq!(res.status().as_u16(), 500);
    let body = json_body(res).await;
    assert_eq!(body["name"], "GeneralError");
    assert_eq!(body["code"], 500);
    assert!(!body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn missing_query_parameter_is_400() {
    let res = router().oneshot(post_json("/course", "{}")).await.unwrap();
    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(json_body(res).await["name"], "ValidationError");

    let res = router().oneshot(post_json("/course?courseId=c-1", "{}")).await.unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await["courseId"], "c-1");
}
