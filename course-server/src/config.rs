use std::env;
use std::time::Duration;

use anyhow::Result;
use course_blob::UploadRules;
use course_core::{CourseConfig, CourseConfigSnapshot, CourseError, WritePolicy};

/// Prefix for environment overrides: `COURSE__POINTER__WRITE_POLICY=strict`.
pub const ENV_PREFIX: &str = "COURSE__";

const DEFAULTS: &[(&str, &str)] = &[
    ("http.host", "127.0.0.1"),
    ("http.port", "3030"),
    ("storage.backend", "memory"),
    ("pointer.backend", "memory"),
    ("pointer.checkpoint_timeout_ms", "5000"),
    ("pointer.publish_timeout_ms", "10000"),
    ("pointer.write_policy", "durable-blob-eventual-pointer"),
    ("uploads.session_ttl_secs", "300"),
    ("uploads.sweep_interval_secs", "60"),
    ("uploads.max_chunks", "1000"),
    ("uploads.max_chunk_bytes", "4194304"),
    ("blob.max_bytes", "52428800"),
    ("media.backends", "memory"),
    ("registry.backend", "memory"),
    ("registry.path", "data/course-registry.json"),
    ("sync.interval_secs", "0"),
    ("migration.budget_secs", "300"),
];

/// Keys read as unsigned integers; anything else in them is a startup error.
const NUMERIC_KEYS: &[&str] = &[
    "pointer.checkpoint_timeout_ms",
    "pointer.publish_timeout_ms",
    "uploads.session_ttl_secs",
    "uploads.sweep_interval_secs",
    "uploads.max_chunks",
    "uploads.max_chunk_bytes",
    "blob.max_bytes",
    "sync.interval_secs",
    "migration.budget_secs",
];

/// Build the configuration: environment first, then defaults for any key
/// left unset.
pub fn load() -> CourseConfig {
    let mut config = CourseConfig::new();

    // Plain HTTP_HOST / HTTP_PORT are honoured as well as the prefixed form
    if let Ok(host) = env::var("HTTP_HOST") {
        config.set("http.host", host);
    }
    if let Ok(port) = env::var("HTTP_PORT") {
        config.set("http.port", port);
    }

    config.load_env(ENV_PREFIX);
    apply_defaults(&mut config);
    config
}

pub fn apply_defaults(config: &mut CourseConfig) {
    for (key, value) in DEFAULTS {
        config.set_default(*key, *value);
    }
}

/// Typed view of the settings the pipeline services read.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub checkpoint_timeout: Duration,
    pub publish_timeout: Duration,
    pub write_policy: WritePolicy,
    pub max_blob_bytes: u64,
    pub upload_rules: UploadRules,
    /// `None` leaves syncing to the cron route
    pub sync_interval: Option<Duration>,
    pub migration_budget: Duration,
    pub admin_token: Option<String>,
    pub cron_secret: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let mut config = CourseConfig::new();
        apply_defaults(&mut config);
        Self::from_defaults_snapshot(&config.snapshot())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &CourseConfigSnapshot) -> Result<Self> {
        check_numeric(config)?;
        let write_policy = config
            .get("pointer.write_policy")
            .unwrap_or(WritePolicy::DurableBlobEventualPointer.as_str())
            .parse::<WritePolicy>()
            .map_err(|e| e.into_anyhow())?;

        Ok(Self {
            write_policy,
            ..Self::from_defaults_snapshot(config)
        })
    }

    fn from_defaults_snapshot(config: &CourseConfigSnapshot) -> Self {
        let rules = UploadRules::default();
        let upload_rules = UploadRules::new()
            .with_session_ttl(config.get_duration_secs("uploads.session_ttl_secs").unwrap_or(rules.session_ttl))
            .with_sweep_interval(
                config
                    .get_duration_secs("uploads.sweep_interval_secs")
                    .unwrap_or(rules.sweep_interval),
            )
            .with_max_chunks(
                config
                    .get_u64("uploads.max_chunks")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(rules.max_chunks),
            )
            .with_max_chunk_bytes(config.get_u64("uploads.max_chunk_bytes").unwrap_or(rules.max_chunk_bytes));

        Self {
            checkpoint_timeout: config
                .get_duration_ms("pointer.checkpoint_timeout_ms")
                .unwrap_or(Duration::from_secs(5)),
            publish_timeout: config
                .get_duration_ms("pointer.publish_timeout_ms")
                .unwrap_or(Duration::from_secs(10)),
            write_policy: WritePolicy::default(),
            max_blob_bytes: config.get_u64("blob.max_bytes").unwrap_or(50 * 1024 * 1024),
            upload_rules,
            sync_interval: config
                .get_duration_secs("sync.interval_secs")
                .filter(|d| !d.is_zero()),
            migration_budget: config
                .get_duration_secs("migration.budget_secs")
                .unwrap_or(Duration::from_secs(300)),
            admin_token: config.get_secret("auth.admin_token"),
            cron_secret: config.get_secret("auth.cron_secret"),
        }
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_checkpoint_timeout(mut self, timeout: Duration) -> Self {
        self.checkpoint_timeout = timeout;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        self.cron_secret = Some(secret.into());
        self
    }
}

fn check_numeric(config: &CourseConfigSnapshot) -> Result<()> {
    for key in NUMERIC_KEYS {
        let Some(raw) = config.get(key) else {
            continue;
        };
        if raw.trim().parse::<u64>().is_err() {
            return Err(CourseError::validation(format!("{key} must be a non-negative integer, got {raw:?}")).into_anyhow());
        }
    }
    if config.get_u64("uploads.max_chunks").is_some_and(|v| u32::try_from(v).is_err()) {
        return Err(CourseError::validation("uploads.max_chunks is out of range").into_anyhow());
    }
    if config.get_u64("uploads.sweep_interval_secs") == Some(0) {
        return Err(CourseError::validation("uploads.sweep_interval_secs must be at least 1").into_anyhow());
    }
    Ok(())
}
