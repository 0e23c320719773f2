use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::BlobError;

/// Opaque handle returned by a blob store (a Telegram `file_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    pub fn new<S: Into<String>>(handle: S) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlobHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for an upload session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID
    pub fn new() -> Self {
        Self(format!("upl_{}", Uuid::new_v4().simple()))
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which writer a reassembled upload is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Checkpoint,
    Publish,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Checkpoint => "checkpoint",
            Operation::Publish => "publish",
        }
    }
}

impl FromStr for Operation {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkpoint" => Ok(Operation::Checkpoint),
            "publish" => Ok(Operation::Publish),
            other => Err(BlobError::invalid(format!(
                "Unknown operation '{other}' (expected checkpoint or publish)"
            ))),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and shape of an encoded snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStats {
    pub size_bytes: u64,
    pub lesson_count: u64,
    pub block_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_ids_are_prefixed_and_unique() {
        let a = UploadId::new();
        let b = UploadId::new();
        assert!(a.as_str().starts_with("upl_"));
        assert_ne!(a, b);
    }

    #[test]
    fn operation_parses_known_names_only() {
        assert_eq!("publish".parse::<Operation>().unwrap(), Operation::Publish);
        assert!("delete".parse::<Operation>().is_err());
    }
}
