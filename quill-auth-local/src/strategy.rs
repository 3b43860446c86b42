// Email/password login.

use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use quill_auth::user::{User, UserDirectory};
use quill_core::errors::QuillError;
use tracing::{debug, error};

use crate::password::{verify_password, DEFAULT_HASH_COST};

// Compared against when the email is unknown so the response takes as long
// as a real password check.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| bcrypt::hash("quill-dummy-password", DEFAULT_HASH_COST).ok());

#[derive(Clone, Debug)]
pub struct LocalStrategyOptions {
    pub error_message: String,
    pub pending_message: String,
    pub hash_cost: u32,
}

impl Default for LocalStrategyOptions {
    fn default() -> Self {
        Self {
            error_message: "Invalid email or password".to_string(),
            pending_message: "Account pending approval".to_string(),
            hash_cost: DEFAULT_HASH_COST,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LocalStrategy {
    options: LocalStrategyOptions,
}

impl LocalStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: LocalStrategyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LocalStrategyOptions {
        &self.options
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        crate::password::hash_password(password, self.options.hash_cost).await
    }

    fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
        let value = value.trim();
        if value.is_empty() {
            return Err(QuillError::bad_request(format!("{field} is required")).into_anyhow());
        }
        Ok(value)
    }

    fn rejected(&self) -> anyhow::Error {
        QuillError::not_authenticated(&self.options.error_message).into_anyhow()
    }

    /// Decide a login attempt.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    /// An unapproved account is only reported after the password matched.
    pub async fn authenticate(
        &self,
        directory: Arc<dyn UserDirectory>,
        email: &str,
        password: &str,
    ) -> Result<User> {
        let email = Self::required(email, "email")?;
        // passwords are compared verbatim, including surrounding whitespace
        Self::required(password, "password")?;

        let Some(record) = directory.find_by_email(email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy).await;
            }
            debug!("login rejected: unknown email");
            return Err(self.rejected());
        };

        let ok = verify_password(password, &record.password_hash)
            .await
            .inspect_err(|err| error!(user = %record.user.id, error = %err, "stored password hash is unusable"))?;
        if !ok {
            debug!(user = %record.user.id, "login rejected: password mismatch");
            return Err(self.rejected());
        }

        if !record.user.approved {
            return Err(QuillError::forbidden(&self.options.pending_message).into_anyhow());
        }

        Ok(record.into_user())
    }
}
