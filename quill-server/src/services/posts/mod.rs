pub mod posts_service;
pub mod posts_shared;

pub use posts_shared::{post_slug, reading_time, Post, PostView, POSTS_COLLECTION};
