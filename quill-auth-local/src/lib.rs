//! Email/password authentication for Quill CMS.

pub mod password;
pub mod strategy;

pub use password::{hash_password, verify_password, DEFAULT_HASH_COST};
pub use strategy::{LocalStrategy, LocalStrategyOptions};
