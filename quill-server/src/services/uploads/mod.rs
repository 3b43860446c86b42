pub mod uploads_service;
pub mod uploads_shared;
