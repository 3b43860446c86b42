//! User records and the request-scoped identity.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Comma-separated subreddit names
    #[serde(default)]
    pub subreddits: String,
}

impl RedditCredentials {
    pub fn is_complete(&self) -> bool {
        ![&self.client_id, &self.client_secret, &self.username, &self.password]
            .iter()
            .any(|v| v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevtoCredentials {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInCredentials {
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacebookCredentials {
    #[serde(default)]
    pub page_id: String,
    #[serde(default)]
    pub page_access_token: String,
}

impl FacebookCredentials {
    pub fn is_complete(&self) -> bool {
        !self.page_id.trim().is_empty() && !self.page_access_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
}

/// Third-party publishing credentials kept on a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reddit: Option<RedditCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devto: Option<DevtoCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<LinkedInCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<FacebookCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<TwitterCredentials>,
}

/// A user as clients see it. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social: Option<SocialCredentials>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A user as stored: the public fields plus the bcrypt hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(flatten)]
    pub user: User,
    #[serde(rename = "password")]
    pub password_hash: String,
}

impl UserRecord {
    pub fn into_user(self) -> User {
        self.user
    }
}

/// The authenticated user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
}

impl Identity {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Lookup of user records in the caller's tenant.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<UserRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> UserRecord {
        serde_json::from_value(json!({
            "id": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "password": "$2b$12$hash",
            "role": "admin",
            "approved": true,
            "social": {"reddit": {"client_id": "cid", "subreddits": "rust"}},
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn stored_record_keeps_hash_but_user_view_drops_it() {
        let record = record();
        assert_eq!(record.password_hash, "$2b$12$hash");
        assert!(record.user.role.is_admin());

        let stored = serde_json::to_value(&record).unwrap();
        assert_eq!(stored["password"], "$2b$12$hash");

        let public = serde_json::to_value(record.into_user()).unwrap();
        assert!(public.get("password").is_none());
        assert_eq!(public["role"], "admin");
        assert_eq!(public["social"]["reddit"]["client_id"], "cid");
        assert!(public["social"].get("facebook").is_none());
    }

    #[test]
    fn roles_parse_strictly() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn reddit_credentials_need_all_four_fields() {
        let mut creds = RedditCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
            username: "bot".into(),
            password: String::new(),
            subreddits: String::new(),
        };
        assert!(!creds.is_complete());
        creds.password = "pw".into();
        assert!(creds.is_complete());
    }
}
