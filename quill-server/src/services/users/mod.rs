pub mod users_service;
pub mod users_shared;
