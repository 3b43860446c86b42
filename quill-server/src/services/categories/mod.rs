pub mod categories_service;
pub mod categories_shared;

pub use categories_shared::{category_slug, Category, CATEGORIES_COLLECTION};
