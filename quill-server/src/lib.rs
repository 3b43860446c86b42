//! Quill CMS server: the blog/documentation API served per tenant.

pub mod app;
pub mod config;
pub mod services;
mod utils;

use anyhow::Result;
use quill_axum::QuillApp;
use quill_core::{QuillConfig, SitesConfig};
use tracing::info;

use crate::services::types::CmsState;

pub fn build(config: &QuillConfig) -> Result<QuillApp> {
    let snapshot = config.snapshot();
    let sites_path = snapshot
        .get_string(config::SITES_PATH)
        .unwrap_or_else(|| "/app/sites-config.json".to_string());
    let sites = SitesConfig::load_or_default(&sites_path);
    info!(sites = sites.len(), path = %sites_path, "tenancy configured");

    let ctx = app::context(&snapshot, sites)?;
    let cms = CmsState::from_config(&snapshot)?;
    Ok(app::cms_app(ctx, cms))
}
