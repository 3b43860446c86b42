pub mod social_service;
