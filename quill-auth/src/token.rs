// Session token issuance and verification.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quill_core::errors::QuillError;
use quill_core::TenantId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::{AuthOptions, JwtAlgorithm};
use crate::secrets::SecretResolver;
use crate::user::{Role, User};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub tenant: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn for_user(user: &User, tenant: &TenantId, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            tenant: tenant.as_str().to_string(),
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }
}

fn invalid_token(reason: impl std::fmt::Display) -> anyhow::Error {
    debug!(%reason, "rejecting session token");
    QuillError::not_authenticated("Invalid or expired token").into_anyhow()
}

/// Sign `claims` with `secret`.
pub fn sign_claims(claims: &SessionClaims, secret: &str, algorithm: JwtAlgorithm) -> Result<String> {
    encode(
        &Header::new(algorithm.to_jsonwebtoken()),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        QuillError::general_error("Token generation failed")
            .with_source(anyhow::Error::new(e))
            .into_anyhow()
    })
}

/// Verify signature and expiry (no leeway) and decode the claims.
pub fn decode_claims(token: &str, secret: &str, algorithm: JwtAlgorithm) -> Result<SessionClaims> {
    let mut validation = Validation::new(algorithm.to_jsonwebtoken());
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "iat"]);

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| invalid_token(e))
}

/// Issues and verifies session tokens with per-tenant secrets.
pub struct TokenIssuer {
    secrets: Arc<SecretResolver>,
    options: AuthOptions,
}

impl TokenIssuer {
    pub fn new(secrets: Arc<SecretResolver>, options: AuthOptions) -> Self {
        Self { secrets, options }
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    pub fn secrets(&self) -> &Arc<SecretResolver> {
        &self.secrets
    }

    pub async fn issue(&self, tenant: &TenantId, user: &User) -> Result<String> {
        let ttl = i64::try_from(self.options.token_ttl.as_secs()).unwrap_or(i64::MAX / 2);
        let claims = SessionClaims::for_user(user, tenant, Utc::now().timestamp(), ttl);
        self.sign(&claims).await
    }

    /// Sign arbitrary claims with the secret of `claims.tenant`.
    pub async fn sign(&self, claims: &SessionClaims) -> Result<String> {
        let tenant = TenantId::new(claims.tenant.clone());
        let secret = self.secrets.secret_for(&tenant).await?;
        sign_claims(claims, &secret, self.options.algorithm)
    }

    /// Verify `token` for a request resolved to `tenant`.
    ///
    /// The signature is checked against `tenant`'s secret and the embedded
    /// tenant claim must name the same tenant, so a token minted for one
    /// site never authenticates on another.
    pub async fn verify(&self, tenant: &TenantId, token: &str) -> Result<SessionClaims> {
        let Some(secret) = self.secrets.existing_secret(tenant).await? else {
            return Err(invalid_token(format_args!("tenant {tenant} has never issued a token")));
        };
        let claims = decode_claims(token, &secret, self.options.algorithm)?;

        if claims.tenant != tenant.as_str() {
            return Err(invalid_token(format_args!(
                "token tenant {} does not match request tenant {}",
                claims.tenant, tenant
            )));
        }
        if claims.user_id.trim().is_empty() {
            return Err(invalid_token("token has no user id"));
        }
        Ok(claims)
    }
}
