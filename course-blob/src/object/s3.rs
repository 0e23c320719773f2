use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use bytes::Bytes;

use super::{ObjectCapabilities, ObjectStore, StoredObject};
use crate::{BlobError, BlobResult};

/// Cloudflare R2 configuration from environment variables
#[derive(Debug, Clone)]
pub struct R2Config {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Public base URL the bucket is served from (custom domain or r2.dev)
    pub public_url: String,
    /// Overrides the account endpoint (S3-compatible test servers)
    pub endpoint_url: Option<String>,
}

impl R2Config {
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            account_id: get_env("R2_ACCOUNT_ID")?,
            access_key_id: get_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: get_env("R2_SECRET_ACCESS_KEY")?,
            bucket: get_env("R2_BUCKET")?,
            public_url: get_env("R2_PUBLIC_URL")?,
            endpoint_url: env::var("R2_ENDPOINT_URL").ok(),
        })
    }

    fn endpoint(&self) -> String {
        self.endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.r2.cloudflarestorage.com", self.account_id))
    }
}

/// Primary object store: R2 through the S3 API
#[derive(Clone)]
pub struct R2ObjectStore {
    client: Client,
    bucket: String,
    public_url: String,
}

impl R2ObjectStore {
    pub async fn new(config: R2Config) -> Self {
        let client = Self::create_client(&config).await;
        Self {
            client,
            bucket: config.bucket,
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(R2Config::from_env()?).await)
    }

    async fn create_client(config: &R2Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "r2",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint())
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    async fn put_object(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredObject> {
        let size_bytes = bytes.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control("public, max-age=31536000, immutable")
            .body(AwsByteStream::from(bytes))
            .send()
            .await
            .map_err(BlobError::backend)?;

        Ok(StoredObject {
            url: format!("{}/{}", self.public_url, key),
            key: key.to_string(),
            backend: self.name(),
            size_bytes,
        })
    }

    fn capabilities(&self) -> ObjectCapabilities {
        ObjectCapabilities::with_priority(10)
    }

    fn name(&self) -> &'static str {
        "r2"
    }
}
