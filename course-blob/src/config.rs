use std::time::Duration;

/// Configuration for blob operations
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Absolute max size allowed for a single encoded snapshot
    pub max_blob_bytes: u64,

    /// Rules for chunked uploads
    pub upload_rules: UploadRules,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            max_blob_bytes: 50 * 1024 * 1024, // 50MB, Telegram's bot upload cap
            upload_rules: UploadRules::default(),
        }
    }
}

/// Rules for chunked uploads
#[derive(Debug, Clone)]
pub struct UploadRules {
    /// Sessions older than this are evicted by the reaper
    pub session_ttl: Duration,

    /// How often the reaper runs
    pub sweep_interval: Duration,

    /// Upper bound on `totalChunks`
    pub max_chunks: u32,

    /// Upper bound on a single chunk body
    pub max_chunk_bytes: u64,

    /// Upper bound on the decompressed payload
    pub max_payload_bytes: u64,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
            max_chunks: 1_000,
            max_chunk_bytes: 4 * 1024 * 1024, // 4MB
            max_payload_bytes: 200 * 1024 * 1024,
        }
    }
}

impl BlobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }

    pub fn with_upload_rules(mut self, rules: UploadRules) -> Self {
        self.upload_rules = rules;
        self
    }
}

impl UploadRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_chunks(mut self, max: u32) -> Self {
        self.max_chunks = max;
        self
    }

    pub fn with_max_chunk_bytes(mut self, bytes: u64) -> Self {
        self.max_chunk_bytes = bytes;
        self
    }

    pub fn with_max_payload_bytes(mut self, bytes: u64) -> Self {
        self.max_payload_bytes = bytes;
        self
    }
}
