use anyhow::Result;
use quill_auth::user::{Role, SocialCredentials, User, UserRecord};
use quill_auth_local::LocalStrategy;
use quill_core::errors::QuillError;
use quill_core::{Filter, ScopedCollection};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::types::{new_id, now, to_document};

/// Signup fields shared by registration, first-admin bootstrap and admin creation.
#[derive(Debug, Deserialize, Validate)]
pub struct Credentials {
    #[serde(default)]
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewUserRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub credentials: Credentials,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "must be a valid email"))]
    pub email: Option<String>,
    #[serde(default)]
    pub social: Option<SocialCredentials>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    #[serde(default)]
    pub role: String,
}

pub fn parse_role(raw: &str) -> Result<Role> {
    raw.trim()
        .parse::<Role>()
        .map_err(|_| QuillError::bad_request("Role must be 'admin' or 'user'").into_anyhow())
}

/// Insert a user unless the email is already taken in this tenant.
///
/// The existence check and the insert are two store calls, so two concurrent
/// signups with one email can both succeed.
pub async fn insert_user(
    users: &ScopedCollection,
    local: &LocalStrategy,
    credentials: &Credentials,
    role: Role,
    approved: bool,
    duplicate_message: &str,
) -> Result<User> {
    let email = credentials.email.trim();
    if users.count_documents(&Filter::new().eq("email", email)).await? > 0 {
        return Err(QuillError::conflict(duplicate_message).into_anyhow());
    }

    let password_hash = local.hash_password(&credentials.password).await?;
    let created = now();
    let user = User {
        id: new_id(),
        name: credentials.name.trim().to_string(),
        email: email.to_string(),
        role,
        approved,
        social: None,
        created_at: created,
        updated_at: created,
    };
    let record = UserRecord {
        user,
        password_hash,
    };
    users.insert_one(to_document(&record)?).await?;
    info!(user = %record.user.id, %role, approved, "user created");
    Ok(record.into_user())
}
