//! Per-tenant signing secrets.
//!
//! [`SecretResolver::secret_for`] returns the HMAC secret a tenant's session
//! tokens are signed and verified with. The answer for a tenant never changes
//! within a process: the first resolution is cached and concurrent first
//! callers are funnelled through one write lock, re-checking the cache after
//! acquiring it.
//!
//! Resolution order on a cache miss:
//! 1. environment variable `TENANT_<ID>_JWT_SECRET`
//! 2. the configured [`SecretStore`]
//! 3. 32 fresh random bytes (URL-safe base64), written back to the store
//!
//! Only issuing a token may reach step 3. Verification and status checks go
//! through [`SecretResolver::existing_secret`] / [`SecretResolver::inspect`],
//! which stop after step 2 and never cache a miss.
//!
//! With the in-memory store a generated secret dies with the process, which
//! invalidates that tenant's outstanding sessions on restart. Deployments
//! with several instances need a durable, shared [`SecretStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use parking_lot::RwLock as SyncRwLock;
use quill_core::errors::QuillError;
use quill_core::TenantId;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const SECRET_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("secret store unavailable: {0}")]
    Unavailable(String),

    #[error("secret store rejected write for tenant {tenant}: {reason}")]
    Rejected { tenant: String, reason: String },
}

/// Backing storage for tenant secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn load(&self, tenant: &TenantId) -> Result<Option<String>, SecretStoreError>;

    async fn save(&self, tenant: &TenantId, secret: &str) -> Result<(), SecretStoreError>;

    /// Whether secrets survive a process restart.
    fn is_durable(&self) -> bool;
}

#[derive(Default)]
pub struct InMemorySecretStore {
    secrets: SyncRwLock<HashMap<TenantId, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn load(&self, tenant: &TenantId) -> Result<Option<String>, SecretStoreError> {
        Ok(self.secrets.read().get(tenant).cloned())
    }

    async fn save(&self, tenant: &TenantId, secret: &str) -> Result<(), SecretStoreError> {
        self.secrets.write().insert(tenant.clone(), secret.to_string());
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// Where a tenant's secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    Environment,
    Stored,
    Generated,
}

#[derive(Debug, Clone)]
struct CachedSecret {
    value: String,
    source: SecretSource,
}

/// Looks up an environment variable by name.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// `TENANT_<ID>_JWT_SECRET`, with the id upper-cased and anything that is
/// not ASCII alphanumeric replaced by `_`.
pub fn secret_env_var(tenant: &TenantId) -> String {
    let id: String = tenant
        .as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("TENANT_{id}_JWT_SECRET")
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

pub struct SecretResolver {
    store: Arc<dyn SecretStore>,
    env: EnvLookup,
    cache: RwLock<HashMap<TenantId, CachedSecret>>,
}

impl SecretResolver {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            env: Arc::new(|name: &str| std::env::var(name).ok()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the environment lookup (tests, embedded deployments).
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn store_is_durable(&self) -> bool {
        self.store.is_durable()
    }

    pub async fn secret_for(&self, tenant: &TenantId) -> anyhow::Result<String> {
        if let Some(cached) = self.cache.read().await.get(tenant) {
            return Ok(cached.value.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.get(tenant) {
            return Ok(cached.value.clone());
        }

        let resolved = match self.lookup(tenant).await? {
            Some(found) => found,
            None => self.generate(tenant).await,
        };
        let value = resolved.value.clone();
        cache.insert(tenant.clone(), resolved);
        Ok(value)
    }

    /// The tenant's secret if one already exists. Never generates, so a
    /// tenant that has not issued a token yet gets `None`.
    pub async fn existing_secret(&self, tenant: &TenantId) -> anyhow::Result<Option<String>> {
        Ok(self.existing(tenant).await?.map(|c| c.value))
    }

    /// Where the tenant's secret comes from, without generating one.
    pub async fn inspect(&self, tenant: &TenantId) -> anyhow::Result<Option<SecretSource>> {
        Ok(self.existing(tenant).await?.map(|c| c.source))
    }

    /// Source of a tenant's secret, if it has been resolved in this process.
    pub async fn source_of(&self, tenant: &TenantId) -> Option<SecretSource> {
        self.cache.read().await.get(tenant).map(|c| c.source)
    }

    async fn existing(&self, tenant: &TenantId) -> anyhow::Result<Option<CachedSecret>> {
        if let Some(cached) = self.cache.read().await.get(tenant) {
            return Ok(Some(cached.clone()));
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.get(tenant) {
            return Ok(Some(cached.clone()));
        }
        let found = self.lookup(tenant).await?;
        if let Some(found) = &found {
            cache.insert(tenant.clone(), found.clone());
        }
        Ok(found)
    }

    async fn lookup(&self, tenant: &TenantId) -> anyhow::Result<Option<CachedSecret>> {
        let var = secret_env_var(tenant);
        if let Some(value) = (self.env)(&var).filter(|v| !v.trim().is_empty()) {
            debug!(%tenant, "using signing secret from environment");
            return Ok(Some(CachedSecret {
                value,
                source: SecretSource::Environment,
            }));
        }

        let stored = self.store.load(tenant).await.map_err(|e| {
            QuillError::unavailable("Secret store unavailable")
                .with_source(anyhow::Error::new(e))
                .into_anyhow()
        })?;
        Ok(stored.map(|value| {
            debug!(%tenant, "using stored signing secret");
            CachedSecret {
                value,
                source: SecretSource::Stored,
            }
        }))
    }

    async fn generate(&self, tenant: &TenantId) -> CachedSecret {
        let value = generate_secret();
        if let Err(err) = self.store.save(tenant, &value).await {
            // The generated value is still usable for this process; it just
            // will not outlive it.
            warn!(%tenant, error = %err, "could not persist generated signing secret");
        }
        if self.store.is_durable() {
            info!(%tenant, "generated and stored signing secret");
        } else {
            warn!(%tenant, env = %secret_env_var(tenant), "generated ephemeral signing secret; sessions end on restart");
        }
        CachedSecret {
            value,
            source: SecretSource::Generated,
        }
    }
}
