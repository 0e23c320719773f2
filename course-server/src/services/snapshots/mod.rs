pub mod snapshots_service;
pub mod snapshots_shared;

pub use snapshots_service::SnapshotWriter;
pub use snapshots_shared::{SnapshotOutcome, SnapshotView};
