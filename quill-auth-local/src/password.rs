// Password hashing.
//
// bcrypt is deliberately slow, so both operations run on the blocking pool.

use anyhow::Result;
use bcrypt::{hash, verify};
use quill_core::errors::QuillError;

pub const DEFAULT_HASH_COST: u32 = 10;

pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| QuillError::general_error("Password processing failed").with_source(e.into()).into_anyhow())?
        .map_err(|e| QuillError::general_error("Password processing failed").with_source(e.into()).into_anyhow())
}

/// `Ok(false)` on mismatch. A malformed stored hash is an error, not a mismatch.
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify(password, &password_hash))
        .await
        .map_err(|e| QuillError::general_error("Password check failed").with_source(e.into()).into_anyhow())?
        .map_err(|e| QuillError::general_error("Password check failed").with_source(e.into()).into_anyhow())
}
