mod inline_media;
pub mod migration_service;

pub use migration_service::{MigrationReport, MigrationService};
