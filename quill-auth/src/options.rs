// Authentication options and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "auth-token";
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// HMAC signing algorithms for session tokens.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum JwtAlgorithm {
    /// HMAC using SHA-256
    #[default]
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

impl JwtAlgorithm {
    pub(crate) fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

/// Session configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthOptions {
    /// Name of the cookie carrying the session token
    pub cookie_name: String,
    /// Lifetime of issued tokens and of the session cookie
    #[serde(with = "humantime_serde")]
    pub token_ttl: Duration,
    /// Mark the session cookie `Secure` (production deployments)
    pub secure_cookie: bool,
    /// Signing algorithm
    pub algorithm: JwtAlgorithm,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            cookie_name: SESSION_COOKIE.to_string(),
            token_ttl: SESSION_TTL,
            secure_cookie: false,
            algorithm: JwtAlgorithm::default(),
        }
    }
}

impl AuthOptions {
    pub fn validate(&self) -> Result<(), String> {
        let name = self.cookie_name.trim();
        if name.is_empty() {
            return Err("Session cookie name cannot be empty".to_string());
        }
        if name.contains(|c: char| c == ';' || c == '=' || c == ',' || c.is_whitespace()) {
            return Err(format!("Invalid session cookie name '{}'", self.cookie_name));
        }
        if self.token_ttl.is_zero() {
            return Err("Token lifetime must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn builder() -> AuthOptionsBuilder {
        AuthOptionsBuilder::new()
    }

    /// Cookie `Max-Age` in seconds.
    pub fn cookie_max_age(&self) -> u64 {
        self.token_ttl.as_secs()
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthOptionsBuilder {
    cookie_name: Option<String>,
    token_ttl: Option<Duration>,
    secure_cookie: bool,
    algorithm: Option<JwtAlgorithm>,
}

impl AuthOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = Some(ttl);
        self
    }

    pub fn secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    pub fn algorithm(mut self, algorithm: JwtAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn build(self) -> AuthOptions {
        let defaults = AuthOptions::default();
        AuthOptions {
            cookie_name: self.cookie_name.unwrap_or(defaults.cookie_name),
            token_ttl: self.token_ttl.unwrap_or(defaults.token_ttl),
            secure_cookie: self.secure_cookie,
            algorithm: self.algorithm.unwrap_or(defaults.algorithm),
        }
    }

    pub fn build_validated(self) -> Result<AuthOptions, String> {
        let options = self.build();
        options.validate()?;
        Ok(options)
    }
}
