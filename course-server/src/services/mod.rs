pub mod adapters;
pub mod migration;
pub mod snapshots;
pub mod sync;
pub mod uploads;

pub use migration::{MigrationReport, MigrationService};
pub use snapshots::{SnapshotOutcome, SnapshotView, SnapshotWriter};
pub use sync::{SyncReport, SyncService};
pub use uploads::UploadService;
