use std::sync::Arc;

use anyhow::{anyhow, Result};
use quill_auth::options::AuthOptions;
use quill_axum::{AppContext, QuillApp};
use quill_core::{QuillConfigSnapshot, SitesConfig};

use crate::config;
use crate::services::{self, types::CmsState};

/// Shared context from configuration. Stores are in-memory unless the
/// caller swaps them in through [`AppContext::builder`].
pub fn context(config: &QuillConfigSnapshot, sites: SitesConfig) -> Result<AppContext> {
    let production = config.get_bool(config::PRODUCTION).unwrap_or(false);
    let auth = AuthOptions::builder()
        .secure_cookie(production)
        .build_validated()
        .map_err(|e| anyhow!("invalid auth options: {e}"))?;

    let mut builder = AppContext::builder()
        .sites(sites)
        .auth(auth)
        .allowed_domains(config.get_list(config::ALLOWED_DOMAINS))
        .production(production)
        .strict_writes(config.get_bool(config::STRICT_WRITES).unwrap_or(false))
        .config(config.clone());
    if let Some(timeout) = config.get_duration(config::STORE_TIMEOUT) {
        builder = builder.store_timeout(timeout);
    }
    builder.build()
}

/// The CMS API under `/api` plus uploaded files under `/uploads`.
pub fn cms_app(ctx: AppContext, cms: CmsState) -> QuillApp {
    let upload_dir = cms.upload_dir.clone();
    let app = QuillApp::new(ctx);
    let routes = services::configure(&app.state, Arc::new(cms));
    app.use_router("/api", routes).use_static("/uploads", upload_dir)
}
