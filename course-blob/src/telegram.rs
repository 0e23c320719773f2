//! Telegram Bot API blob store.
//!
//! Snapshots are sent as documents to a private chat; the returned
//! `file_id` is the blob handle. Downloads resolve the id with `getFile`
//! and then fetch the file path.

use std::env;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::{BlobError, BlobHandle, BlobResult, BlobStore, PutResult, StoreCapabilities};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Bots may upload documents up to 50MB and download up to 20MB.
const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
const MAX_DOWNLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            bot_token: get_env("TELEGRAM_BOT_TOKEN")?,
            chat_id: get_env("TELEGRAM_CHAT_ID")?,
            api_base: env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    #[serde(default)]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

#[derive(Clone)]
pub struct TelegramBlobStore {
    client: Client,
    config: TelegramConfig,
}

impl TelegramBlobStore {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> BlobResult<Self> {
        Ok(Self::new(TelegramConfig::from_env()?))
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            file_path
        )
    }

    fn api_failure<T>(response: &ApiResponse<T>) -> String {
        format!(
            "telegram error {}: {}",
            response.error_code.unwrap_or_default(),
            response.description.as_deref().unwrap_or("unknown")
        )
    }
}

#[async_trait]
impl BlobStore for TelegramBlobStore {
    async fn upload(&self, file_name: &str, bytes: Bytes) -> BlobResult<PutResult> {
        let size_bytes = bytes.len() as u64;
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/json")
            .map_err(BlobError::backend)?;
        let form = multipart::Form::new()
            .text("chat_id", self.config.chat_id.clone())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BlobError::upload_failed(format!("telegram sendDocument: {e}")))?;

        let body: ApiResponse<SentMessage> = response.json().await.map_err(BlobError::backend)?;
        if !body.ok {
            return Err(BlobError::upload_failed(Self::api_failure(&body)));
        }

        let document = body
            .result
            .and_then(|m| m.document)
            .ok_or_else(|| BlobError::upload_failed("telegram response had no document"))?;

        Ok(PutResult {
            handle: BlobHandle(document.file_id),
            size_bytes: document.file_size.unwrap_or(size_bytes),
        })
    }

    async fn download(&self, handle: &BlobHandle) -> BlobResult<Bytes> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", handle.as_str())])
            .send()
            .await
            .map_err(BlobError::backend)?;

        let body: ApiResponse<FileInfo> = response.json().await.map_err(BlobError::backend)?;
        if !body.ok {
            // Telegram answers 400 "wrong file_id" / "file is temporarily unavailable".
            if body.error_code == Some(400) {
                return Err(BlobError::not_found(handle.as_str()));
            }
            return Err(BlobError::upload_failed(Self::api_failure(&body)));
        }

        let file_path = body
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| BlobError::not_found(handle.as_str()))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(BlobError::backend)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BlobError::not_found(handle.as_str())),
            status if !status.is_success() => {
                warn!(handle = %handle, %status, "Telegram file download failed");
                Err(BlobError::upload_failed(format!("telegram file download returned {status}")))
            }
            _ => response.bytes().await.map_err(BlobError::backend),
        }
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic()
            .with_upload_limit(MAX_UPLOAD_BYTES)
            .with_download_limit(MAX_DOWNLOAD_BYTES)
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
