pub mod uploads_service;

pub use uploads_service::UploadService;
