use std::env;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ObjectCapabilities, ObjectStore, StoredObject};
use crate::{BlobError, BlobResult};

const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub access_token: String,
    pub folder_id: Option<String>,
}

impl DriveConfig {
    pub fn from_env() -> BlobResult<Self> {
        let access_token = env::var("GOOGLE_DRIVE_ACCESS_TOKEN")
            .map_err(|_| BlobError::invalid("GOOGLE_DRIVE_ACCESS_TOKEN environment variable required"))?;
        Ok(Self {
            access_token,
            folder_id: env::var("GOOGLE_DRIVE_FOLDER_ID").ok(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Secondary object store: Google Drive files shared as "anyone with the link".
#[derive(Clone)]
pub struct GoogleDriveObjectStore {
    client: Client,
    config: DriveConfig,
}

impl GoogleDriveObjectStore {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> BlobResult<Self> {
        Ok(Self::new(DriveConfig::from_env()?))
    }

    /// `multipart/related` body: JSON metadata part, then the media part.
    fn related_body(&self, name: &str, content_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!("course-media-{}", Uuid::new_v4().simple());
        let mut metadata = json!({ "name": name, "mimeType": content_type });
        if let Some(folder) = &self.config.folder_id {
            metadata["parents"] = json!([folder]);
        }

        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        (format!("multipart/related; boundary={boundary}"), body)
    }

    fn public_url(file_id: &str) -> String {
        format!("https://drive.google.com/uc?export=view&id={file_id}")
    }
}

#[async_trait]
impl ObjectStore for GoogleDriveObjectStore {
    async fn put_object(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredObject> {
        let size_bytes = bytes.len() as u64;
        let name = key.replace('/', "_");
        let (multipart_type, body) = self.related_body(&name, content_type, &bytes);

        let response = self
            .client
            .post(UPLOAD_URL)
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::CONTENT_TYPE, multipart_type)
            .body(body)
            .send()
            .await
            .map_err(BlobError::backend)?;
        if !response.status().is_success() {
            return Err(BlobError::upload_failed(format!(
                "drive upload returned {}",
                response.status()
            )));
        }
        let created: CreatedFile = response.json().await.map_err(BlobError::backend)?;

        let response = self
            .client
            .post(format!("{FILES_URL}/{}/permissions", created.id))
            .bearer_auth(&self.config.access_token)
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(BlobError::backend)?;
        if !response.status().is_success() {
            return Err(BlobError::upload_failed(format!(
                "drive permission update returned {}",
                response.status()
            )));
        }

        Ok(StoredObject {
            url: Self::public_url(&created.id),
            key: key.to_string(),
            backend: self.name(),
            size_bytes,
        })
    }

    fn capabilities(&self) -> ObjectCapabilities {
        ObjectCapabilities::with_priority(20)
    }

    fn name(&self) -> &'static str {
        "google-drive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn related_body_has_metadata_then_media() {
        let store = GoogleDriveObjectStore::new(DriveConfig {
            access_token: "t".into(),
            folder_id: Some("folder1".into()),
        });
        let (content_type, body) = store.related_body("a.png", "image/png", b"PNG");
        let boundary = content_type.trim_start_matches("multipart/related; boundary=");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains(r#""parents":["folder1"]"#));
        assert!(text.contains("Content-Type: image/png\r\n\r\nPNG\r\n"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }
}
