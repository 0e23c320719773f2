//! course-core: transport-agnostic core of the course content pipeline.
//!
//! - [`errors`]: the error taxonomy shared by every crate
//! - [`config`]: key/value configuration with env overrides
//! - [`model`]: the course object and its content tree
//! - [`pointer`]: pointer records and the system-of-record trait
//! - [`policy`]: how snapshot writes treat pointer-store failures

pub mod config;
pub mod errors;
pub mod model;
pub mod pointer;
pub mod policy;

pub use config::{CourseConfig, CourseConfigSnapshot};
pub use errors::{CourseError, CourseResult, ErrorKind};
pub use model::{ContentNode, Course, CourseMeta, Lesson, Section};
pub use pointer::{
    CourseStatus, DraftSnapshot, MemoryPointerStore, PointerRecord, PointerResult, PointerSlot,
    PointerStore, PointerStoreError, PointerWrite, PublishedSnapshot, SnapshotBlob,
};
pub use policy::WritePolicy;
