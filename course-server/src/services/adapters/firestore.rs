//! Pointer records in Cloud Firestore, over the REST API.
//!
//! Every write is read-modify-write guarded by a `currentDocument`
//! precondition, so the version check in [`PointerRecord::apply`] holds
//! even with several writers racing on one course.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::{
    PointerRecord, PointerResult, PointerSlot, PointerStore, PointerStoreError, PointerWrite,
};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

const PRECONDITION_RETRIES: usize = 3;
const LIST_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub access_token: Option<String>,
    /// `host:port` of a local emulator
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    pub fn from_env() -> PointerResult<Self> {
        let project_id = env::var("FIRESTORE_PROJECT_ID")
            .or_else(|_| env::var("GOOGLE_CLOUD_PROJECT"))
            .map_err(|_| PointerStoreError::Unavailable("FIRESTORE_PROJECT_ID is not set".into()))?;
        let emulator_host = env::var("FIRESTORE_EMULATOR_HOST").ok().filter(|h| !h.is_empty());
        let access_token = env::var("FIRESTORE_ACCESS_TOKEN").ok().filter(|t| !t.is_empty());
        if access_token.is_none() && emulator_host.is_none() {
            return Err(PointerStoreError::Unavailable(
                "FIRESTORE_ACCESS_TOKEN is required outside the emulator".into(),
            ));
        }

        Ok(Self {
            project_id,
            database: env::var("FIRESTORE_DATABASE").unwrap_or_else(|_| "(default)".to_string()),
            collection: env::var("FIRESTORE_COLLECTION").unwrap_or_else(|_| "courses".to_string()),
            access_token,
            emulator_host,
        })
    }

    fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{host}/v1"),
            None => "https://firestore.googleapis.com/v1".to_string(),
        }
    }

    fn collection_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}",
            self.project_id, self.database, self.collection
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    #[serde(default)]
    fields: Map<String, Value>,
    update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

pub struct FirestorePointerStore {
    client: Client,
    config: FirestoreConfig,
}

impl FirestorePointerStore {
    pub fn new(config: FirestoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn from_env() -> PointerResult<Self> {
        Ok(Self::new(FirestoreConfig::from_env()?))
    }

    fn document_url(&self, course_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url(),
            self.config.collection_path(),
            course_id
        )
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match (&self.config.access_token, &self.config.emulator_host) {
            (Some(token), _) => builder.bearer_auth(token),
            (None, Some(_)) => builder.bearer_auth("owner"),
            (None, None) => builder,
        }
    }

    async fn get_document(&self, course_id: &str) -> PointerResult<Option<Document>> {
        let response = self
            .request(Method::GET, &self.document_url(course_id))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let doc = response
            .json::<Document>()
            .await
            .map_err(|e| PointerStoreError::Backend(format!("invalid document: {e}")))?;
        Ok(Some(doc))
    }

    /// Write `record` if the document is still at `update_time`
    /// (or still absent). `Ok(false)` means the precondition failed.
    async fn patch_document(
        &self,
        record: &PointerRecord,
        update_time: Option<&str>,
        mask: &[&str],
    ) -> PointerResult<bool> {
        let fields = encode_record(record)?;

        let mut query: Vec<(&str, String)> = mask
            .iter()
            .map(|field| ("updateMask.fieldPaths", (*field).to_string()))
            .collect();
        match update_time {
            Some(at) => query.push(("currentDocument.updateTime", at.to_string())),
            None => query.push(("currentDocument.exists", "false".to_string())),
        }

        let response = self
            .request(Method::PATCH, &self.document_url(&record.course_id))
            .query(&query)
            .json(&json!({ "fields": fields }))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => Ok(false),
            status @ (StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND) => {
                let body = response.text().await.unwrap_or_default();
                if body.contains("FAILED_PRECONDITION") || body.contains("NOT_FOUND") || body.contains("ALREADY_EXISTS") {
                    Ok(false)
                } else {
                    Err(classify_failure(status, &body))
                }
            }
            _ => {
                check_status(response).await?;
                Ok(true)
            }
        }
    }

    /// Read, modify and patch under an `updateTime` precondition. A
    /// `modify` that returns `None` leaves the document untouched.
    async fn read_modify_write<F>(
        &self,
        course_id: &str,
        mask: &[&str],
        mut modify: F,
    ) -> PointerResult<Option<PointerRecord>>
    where
        F: FnMut(Option<PointerRecord>) -> PointerResult<Option<PointerRecord>> + Send,
    {
        for attempt in 0..PRECONDITION_RETRIES {
            let doc = self.get_document(course_id).await?;
            let update_time = doc.as_ref().and_then(|d| d.update_time.clone());
            let current = doc.map(|d| decode_record(course_id, d.fields)).transpose()?;

            let Some(record) = modify(current)? else {
                return Ok(None);
            };
            if self.patch_document(&record, update_time.as_deref(), mask).await? {
                return Ok(Some(record));
            }
            debug!(course_id, attempt, "Firestore precondition failed, reloading");
        }

        Err(PointerStoreError::Unavailable(format!(
            "document {course_id} kept changing during write"
        )))
    }
}

#[async_trait]
impl PointerStore for FirestorePointerStore {
    async fn load(&self, course_id: &str) -> PointerResult<Option<PointerRecord>> {
        self.get_document(course_id)
            .await?
            .map(|doc| decode_record(course_id, doc.fields))
            .transpose()
    }

    async fn write(&self, course_id: &str, write: &PointerWrite) -> PointerResult<PointerRecord> {
        let mask = [
            "courseId",
            "meta",
            "sections",
            write.slot.field_name(),
            "status",
            "updatedAt",
        ];
        self.read_modify_write(course_id, &mask, |current| {
            let mut record = current.unwrap_or_else(|| PointerRecord::new(course_id));
            record.apply(write)?;
            Ok(Some(record))
        })
        .await?
        .ok_or_else(|| PointerStoreError::Backend(format!("write to {course_id} produced no record")))
    }

    async fn backfill(
        &self,
        course_id: &str,
        slot: PointerSlot,
        from_handle: &str,
        blob_handle: &str,
        hash: &str,
    ) -> PointerResult<bool> {
        let mask = [slot.field_name(), "updatedAt"];
        let patched = self
            .read_modify_write(course_id, &mask, |current| {
                let mut record = current.ok_or_else(|| PointerStoreError::NotFound(course_id.to_string()))?;
                Ok(record
                    .backfill(slot, from_handle, blob_handle, hash)?
                    .then_some(record))
            })
            .await?;
        Ok(patched.is_some())
    }

    async fn list(&self) -> PointerResult<Vec<PointerRecord>> {
        let url = format!("{}/{}", self.config.base_url(), self.config.collection_path());
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .request(Method::GET, &url)
                .query(&query)
                .send()
                .await
                .map_err(transport_error)?;
            let page = check_status(response)
                .await?
                .json::<ListResponse>()
                .await
                .map_err(|e| PointerStoreError::Backend(format!("invalid list response: {e}")))?;

            for doc in page.documents {
                let course_id = doc
                    .fields
                    .get("courseId")
                    .and_then(|v| v.get("stringValue"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                records.push(decode_record(&course_id, doc.fields)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

fn transport_error(err: reqwest::Error) -> PointerStoreError {
    if err.is_timeout() {
        PointerStoreError::Unavailable(format!("request timed out: {err}"))
    } else {
        PointerStoreError::Unavailable(err.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> PointerResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body))
}

fn classify_failure(status: StatusCode, body: &str) -> PointerStoreError {
    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return PointerStoreError::QuotaExhausted(body.to_string());
    }
    match status {
        StatusCode::NOT_FOUND => PointerStoreError::NotFound(body.to_string()),
        s if s.is_server_error() => PointerStoreError::Unavailable(format!("{s}: {body}")),
        s => PointerStoreError::Backend(format!("{s}: {body}")),
    }
}

fn encode_record(record: &PointerRecord) -> PointerResult<Map<String, Value>> {
    let value = serde_json::to_value(record).map_err(|e| PointerStoreError::Backend(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().map(|(k, v)| (k, encode_value(v))).collect()),
        _ => Err(PointerStoreError::Backend("pointer record is not an object".into())),
    }
}

fn decode_record(course_id: &str, fields: Map<String, Value>) -> PointerResult<PointerRecord> {
    let mut plain: Map<String, Value> = fields.into_iter().map(|(k, v)| (k, decode_value(v))).collect();
    plain
        .entry("courseId")
        .or_insert_with(|| Value::String(course_id.to_string()));
    serde_json::from_value(Value::Object(plain))
        .map_err(|e| PointerStoreError::Backend(format!("undecodable pointer record {course_id}: {e}")))
}

/// JSON value to a Firestore typed value.
fn encode_value(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.into_iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map.into_iter().map(|(k, v)| (k, encode_value(v))).collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Firestore typed value back to plain JSON.
fn decode_value(value: Value) -> Value {
    let Value::Object(mut typed) = value else {
        return Value::Null;
    };

    if let Some(v) = typed.remove("stringValue") {
        return v;
    }
    if let Some(v) = typed.remove("booleanValue") {
        return v;
    }
    if let Some(v) = typed.remove("integerValue") {
        return v
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(v);
    }
    if let Some(v) = typed.remove("doubleValue") {
        return v;
    }
    if let Some(v) = typed.remove("timestampValue") {
        return v
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| Value::String(t.with_timezone(&Utc).to_rfc3339()))
            .unwrap_or(v);
    }
    if let Some(v) = typed.remove("arrayValue") {
        let items = match v.get("values") {
            Some(Value::Array(items)) => items.iter().cloned().map(decode_value).collect(),
            _ => Vec::new(),
        };
        return Value::Array(items);
    }
    if let Some(v) = typed.remove("mapValue") {
        let fields: BTreeMap<String, Value> = match v.get("fields") {
            Some(Value::Object(fields)) => fields
                .iter()
                .map(|(k, v)| (k.clone(), decode_value(v.clone())))
                .collect(),
            _ => BTreeMap::new(),
        };
        return Value::Object(fields.into_iter().collect());
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::{CourseMeta, SnapshotBlob};

    fn config(emulator: Option<&str>) -> FirestoreConfig {
        FirestoreConfig {
            project_id: "demo".into(),
            database: "(default)".into(),
            collection: "courses".into(),
            access_token: None,
            emulator_host: emulator.map(str::to_string),
        }
    }

    #[test]
    fn document_urls_follow_the_emulator_setting() {
        let store = FirestorePointerStore::new(config(Some("localhost:8080")));
        assert_eq!(
            store.document_url("c1"),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents/courses/c1"
        );

        let store = FirestorePointerStore::new(config(None));
        assert!(store.document_url("c1").starts_with("https://firestore.googleapis.com/v1/"));
    }

    #[test]
    fn typed_values_carry_integers_as_strings() {
        let encoded = encode_value(json!({ "version": 3, "dirty": true, "tags": ["a"], "gone": null }));
        let fields = &encoded["mapValue"]["fields"];
        assert_eq!(fields["version"], json!({ "integerValue": "3" }));
        assert_eq!(fields["dirty"], json!({ "booleanValue": true }));
        assert_eq!(fields["tags"]["arrayValue"]["values"][0], json!({ "stringValue": "a" }));
        assert_eq!(decode_value(encoded)["version"], json!(3));
    }

    #[test]
    fn records_survive_the_document_encoding() {
        let mut record = PointerRecord::new("c1");
        let write = PointerWrite::new(
            PointerSlot::Draft,
            SnapshotBlob {
                blob_handle: "f1".into(),
                hash: "h1".into(),
                lesson_count: 3,
                block_count: 9,
                size_bytes: 120,
            },
            CourseMeta {
                title: "Rust".into(),
                ..CourseMeta::default()
            },
            vec![],
        );
        record.apply(&write).unwrap();

        let fields = encode_record(&record).unwrap();
        let decoded = decode_record("c1", fields).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn quota_errors_are_recognised() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_quota_exhausted());

        let err = classify_failure(StatusCode::BAD_REQUEST, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#);
        assert!(err.is_quota_exhausted());

        let err = classify_failure(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(matches!(err, PointerStoreError::Unavailable(_)));
    }
}
