//! # Configuration
//!
//! A minimal string key/value store. Values are set while the application
//! is being built and then frozen into a [`CourseConfigSnapshot`] that the
//! services read from.
//!
//! ```rust
//! use course_core::CourseConfig;
//!
//! let mut config = CourseConfig::new();
//! config.set("pointer.checkpoint_timeout_ms", "5000");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(
//!     snapshot.get_duration_ms("pointer.checkpoint_timeout_ms"),
//!     Some(std::time::Duration::from_millis(5000))
//! );
//! ```
//!
//! ## Environment overrides
//!
//! [`CourseConfig::load_env`] maps prefixed variables onto dotted keys:
//!
//! ```bash
//! export COURSE__POINTER__WRITE_POLICY=strict   # pointer.write_policy
//! ```

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CourseConfig {
    values: HashMap<String, String>,
}

impl CourseConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only if nothing set it before.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy every `{prefix}A__B=value` environment variable into `a.b`.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                self.values.insert(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> CourseConfigSnapshot {
        CourseConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CourseConfigSnapshot {
    map: HashMap<String, String>,
}

impl CourseConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }

    pub fn get_duration_ms(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_millis)
    }

    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_secs)
    }

    /// Non-empty string value, treating `""` as unset.
    pub fn get_secret(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}
