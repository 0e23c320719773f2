//! course-axum: Axum adapter for the course storage pipeline.
//!
//! Builds the HTTP router, turns pipeline errors into JSON responses and
//! gives handlers typed access to query parameters and bearer guards.

pub mod app;
pub mod auth;
pub mod params;
mod error;

pub use error::{CourseAxumError, HandlerResult};
pub use params::RequestParams;
pub use auth::BearerGuard;

pub use app::{axum, AxumApp};
