use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use quill_auth::options::AuthOptions;
use quill_auth::secrets::{EnvLookup, InMemorySecretStore, SecretResolver, SecretStore};
use quill_auth::token::TokenIssuer;
use quill_core::accessor::DEFAULT_STORE_TIMEOUT;
use quill_core::{
    DataAccessor, DocumentStore, MemoryStore, QuillConfigSnapshot, SitesConfig, TenantResolver,
};

use crate::middlewares::cors::CorsPolicy;

/// What to do with requests whose tenant fell back to the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenancyPolicy {
    /// Refuse non-safe methods on fallback-tenant requests.
    pub strict_writes: bool,
}

/// Process-wide state: every cache lives here and nowhere else.
pub struct AppContext {
    pub resolver: TenantResolver,
    pub data: DataAccessor,
    pub secrets: Arc<SecretResolver>,
    pub tokens: TokenIssuer,
    pub cors: CorsPolicy,
    pub tenancy: TenancyPolicy,
    pub config: QuillConfigSnapshot,
    pub started: Instant,
    pub started_at: SystemTime,
}

impl AppContext {
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn auth(&self) -> &AuthOptions {
        self.tokens.options()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct AppContextBuilder {
    sites: Option<Arc<SitesConfig>>,
    store: Option<Arc<dyn DocumentStore>>,
    secret_store: Option<Arc<dyn SecretStore>>,
    env: Option<EnvLookup>,
    auth: AuthOptions,
    allowed_domains: Vec<String>,
    production: bool,
    tenancy: TenancyPolicy,
    store_timeout: Duration,
    config: QuillConfigSnapshot,
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self {
            sites: None,
            store: None,
            secret_store: None,
            env: None,
            auth: AuthOptions::default(),
            allowed_domains: Vec::new(),
            production: false,
            tenancy: TenancyPolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            config: QuillConfigSnapshot::default(),
        }
    }
}

impl AppContextBuilder {
    pub fn sites(mut self, sites: SitesConfig) -> Self {
        self.sites = Some(Arc::new(sites));
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    /// Override how `TENANT_<ID>_JWT_SECRET` variables are read.
    pub fn env(mut self, env: EnvLookup) -> Self {
        self.env = Some(env);
        self
    }

    pub fn auth(mut self, options: AuthOptions) -> Self {
        self.auth = options;
        self
    }

    pub fn allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn strict_writes(mut self, strict: bool) -> Self {
        self.tenancy.strict_writes = strict;
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn config(mut self, config: QuillConfigSnapshot) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> anyhow::Result<AppContext> {
        self.auth.validate().map_err(anyhow::Error::msg)?;

        let sites = self.sites.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let secret_store = self
            .secret_store
            .unwrap_or_else(|| Arc::new(InMemorySecretStore::new()));

        let mut secrets = SecretResolver::new(secret_store);
        if let Some(env) = self.env {
            secrets = secrets.with_env(env);
        }
        let secrets = Arc::new(secrets);

        let resolver = TenantResolver::new(sites);
        let sites = resolver.sites();

        let cors = CorsPolicy::new(
            self.allowed_domains,
            sites.domains().map(str::to_string).collect(),
            self.production,
        );

        let data = DataAccessor::new(store)
            .with_default_database(sites.fallback().database.clone())
            .with_known_databases(sites.databases())
            .with_timeout(self.store_timeout);

        Ok(AppContext {
            resolver,
            data,
            tokens: TokenIssuer::new(Arc::clone(&secrets), self.auth),
            secrets,
            cors,
            tenancy: self.tenancy,
            config: self.config,
            started: Instant::now(),
            started_at: SystemTime::now(),
        })
    }
}

/// Axum state handle; cheap to clone.
#[derive(Clone)]
pub struct QuillState {
    pub ctx: Arc<AppContext>,
}

impl QuillState {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

impl Deref for QuillState {
    type Target = AppContext;

    fn deref(&self) -> &AppContext {
        &self.ctx
    }
}
