use std::str::FromStr;

use crate::errors::CourseError;
use crate::pointer::PointerStoreError;

/// How a snapshot write treats pointer-store failures once its blob is
/// durably uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// The blob is the source of truth. Pointer failures are logged, the
    /// write is queued for the sync sweep and the caller still succeeds.
    #[default]
    DurableBlobEventualPointer,
    /// Pointer failures fail the request with 503.
    Strict,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePolicy::DurableBlobEventualPointer => "durable-blob-eventual-pointer",
            WritePolicy::Strict => "strict",
        }
    }

    /// Whether a pointer failure is absorbed into a pending sync.
    ///
    /// Version conflicts are never absorbed: retrying them later would
    /// silently overwrite a newer snapshot.
    pub fn absorbs(&self, err: &PointerStoreError) -> bool {
        match self {
            WritePolicy::DurableBlobEventualPointer => !err.is_conflict(),
            WritePolicy::Strict => false,
        }
    }
}

impl FromStr for WritePolicy {
    type Err = CourseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "durable-blob-eventual-pointer" | "durable" | "eventual" => {
                Ok(WritePolicy::DurableBlobEventualPointer)
            }
            "strict" => Ok(WritePolicy::Strict),
            other => Err(CourseError::validation(format!("Unknown write policy: {other}"))),
        }
    }
}

impl std::fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
