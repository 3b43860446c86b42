//! Tenant model and resolution.
//!
//! A tenant is one site served by this process. Sites are described once at
//! startup by a domain → [`TenantDescriptor`] mapping ([`SitesConfig`]) and
//! every request is mapped onto a [`TenantContext`] by [`TenantResolver`].
//! Resolution never fails: unknown domains land on the default descriptor,
//! which the sites file may supply under the key `"default"`.
//! The context records *how* it was resolved so that callers can refuse
//! privileged work on a fallback resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_TENANT_ID: &str = "default";
pub const DEFAULT_DATABASE: &str = "coders_website";

/// Tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static description of one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Default for TenantDescriptor {
    fn default() -> Self {
        Self {
            id: DEFAULT_TENANT_ID.to_string(),
            directory: DEFAULT_TENANT_ID.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            theme: "light".to_string(),
            features: vec!["blog".to_string()],
        }
    }
}

/// Domain → descriptor mapping, read-only after load.
#[derive(Debug, Clone, Default)]
pub struct SitesConfig {
    sites: BTreeMap<String, TenantDescriptor>,
    fallback: TenantDescriptor,
}

impl SitesConfig {
    /// Normalise the mapping. A `"default"` entry is not a domain: it
    /// replaces the built-in descriptor used for unmatched requests.
    pub fn new(sites: BTreeMap<String, TenantDescriptor>) -> Self {
        let mut sites: BTreeMap<String, TenantDescriptor> = sites
            .into_iter()
            .map(|(domain, mut descriptor)| {
                let domain = domain.trim().to_ascii_lowercase();
                if descriptor.id.trim().is_empty() {
                    descriptor.id = domain.clone();
                }
                if descriptor.database.trim().is_empty() {
                    descriptor.database = DEFAULT_DATABASE.to_string();
                }
                if descriptor.directory.trim().is_empty() {
                    descriptor.directory = descriptor.id.clone();
                }
                (domain, descriptor)
            })
            .collect();

        let fallback = sites.remove(DEFAULT_TENANT_ID).unwrap_or_default();

        Self { sites, fallback }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let sites: BTreeMap<String, TenantDescriptor> =
            serde_json::from_str(raw).context("sites config is not a domain → descriptor map")?;
        Ok(Self::new(sites))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading sites config {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Load the mapping, or serve the default descriptor alone when the file
    /// is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => {
                debug!(sites = config.sites.len(), "loaded sites config");
                config
            }
            Err(err) => {
                warn!(path = %path.as_ref().display(), error = %err, "sites config unavailable, serving default tenant only");
                Self::default()
            }
        }
    }

    pub fn get(&self, domain: &str) -> Option<&TenantDescriptor> {
        self.sites.get(domain)
    }

    pub fn fallback(&self) -> &TenantDescriptor {
        &self.fallback
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(|s| s.as_str())
    }

    /// Distinct database names across the mapping, including the default.
    pub fn databases(&self) -> BTreeSet<String> {
        self.sites
            .values()
            .map(|d| d.database.clone())
            .chain(std::iter::once(self.fallback.database.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// How a request's tenant was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSource {
    /// The domain matched a configured site.
    Mapped,
    /// An explicit tenant-id or database header was supplied.
    Override,
    /// Nothing matched; the default descriptor is in use.
    Fallback,
}

/// Request-scoped tenant identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub id: TenantId,
    pub domain: String,
    pub database: String,
    pub descriptor: TenantDescriptor,
    pub source: TenantSource,
}

impl TenantContext {
    pub fn is_fallback(&self) -> bool {
        self.source == TenantSource::Fallback
    }
}

/// Transport-neutral resolution inputs. Blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct TenantHints {
    pub domain: Option<String>,
    pub tenant_id: Option<String>,
    pub database: Option<String>,
    pub host: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}

#[derive(Debug, Clone)]
pub struct TenantResolver {
    sites: Arc<SitesConfig>,
}

impl TenantResolver {
    pub fn new(sites: Arc<SitesConfig>) -> Self {
        Self { sites }
    }

    pub fn sites(&self) -> &SitesConfig {
        &self.sites
    }

    pub fn resolve(&self, hints: &TenantHints) -> TenantContext {
        let domain = non_blank(&hints.domain)
            .map(str::to_string)
            .or_else(|| non_blank(&hints.host).map(|h| strip_port(h).to_string()))
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mapped = self.sites.get(&domain).or_else(|| {
            domain
                .strip_prefix("www.")
                .and_then(|bare| self.sites.get(bare))
        });
        let domain = match domain.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => domain,
        };

        let id_override = non_blank(&hints.tenant_id);
        let db_override = non_blank(&hints.database);

        let source = if id_override.is_some() || db_override.is_some() {
            TenantSource::Override
        } else if mapped.is_some() {
            TenantSource::Mapped
        } else {
            TenantSource::Fallback
        };

        let descriptor = mapped.unwrap_or_else(|| self.sites.fallback()).clone();
        let id = id_override.unwrap_or(&descriptor.id).to_string();
        let database = db_override.unwrap_or(&descriptor.database).to_string();

        debug!(tenant = %id, %database, %domain, ?source, "resolved tenant");

        TenantContext {
            id: TenantId(id),
            domain,
            database,
            descriptor,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> TenantResolver {
        let sites = SitesConfig::from_json(
            r#"{
                "acme.test": {"id": "acme", "directory": "acme", "database": "acme_db", "theme": "dark", "features": ["blog", "docs"]},
                "globex.test": {"id": "globex", "database": ""}
            }"#,
        )
        .unwrap();
        TenantResolver::new(Arc::new(sites))
    }

    fn host(h: &str) -> TenantHints {
        TenantHints {
            host: Some(h.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn host_with_port_maps_to_descriptor() {
        let ctx = resolver().resolve(&host("acme.test:4321"));
        assert_eq!(ctx.id.as_str(), "acme");
        assert_eq!(ctx.database, "acme_db");
        assert_eq!(ctx.domain, "acme.test");
        assert_eq!(ctx.source, TenantSource::Mapped);
    }

    #[test]
    fn www_prefix_is_retried_without_it() {
        let ctx = resolver().resolve(&host("www.acme.test"));
        assert_eq!(ctx.id.as_str(), "acme");
        assert_eq!(ctx.domain, "acme.test");
        assert_eq!(ctx.source, TenantSource::Mapped);

        let ctx = resolver().resolve(&host("www.unknown.example:8080"));
        assert_eq!(ctx.domain, "unknown.example");
        assert!(ctx.is_fallback());
    }

    #[test]
    fn unknown_host_falls_back_to_default() {
        let ctx = resolver().resolve(&host("unknown.example"));
        assert_eq!(ctx.id.as_str(), DEFAULT_TENANT_ID);
        assert_eq!(ctx.database, DEFAULT_DATABASE);
        assert!(ctx.is_fallback());
    }

    #[test]
    fn sites_file_default_entry_is_the_fallback() {
        let sites = SitesConfig::from_json(
            r#"{
                "default": {"id": "main", "directory": "main", "database": "main_db"},
                "acme.test": {"id": "acme", "database": "acme_db"}
            }"#,
        )
        .unwrap();
        assert_eq!(sites.len(), 1);
        assert!(sites.databases().contains("main_db"));
        assert!(!sites.databases().contains(DEFAULT_DATABASE));

        let resolver = TenantResolver::new(Arc::new(sites));
        let ctx = resolver.resolve(&host("unknown.example"));
        assert_eq!(ctx.id.as_str(), "main");
        assert_eq!(ctx.database, "main_db");
        assert_eq!(ctx.descriptor.directory, "main");
        assert!(ctx.is_fallback());

        let ctx = resolver.resolve(&host("acme.test"));
        assert_eq!(ctx.database, "acme_db");
    }

    #[test]
    fn default_entry_without_database_uses_the_builtin_one() {
        let sites = SitesConfig::from_json(r#"{"default": {"theme": "dark"}}"#).unwrap();
        assert!(sites.is_empty());
        assert_eq!(sites.fallback().id, DEFAULT_TENANT_ID);
        assert_eq!(sites.fallback().database, DEFAULT_DATABASE);
        assert_eq!(sites.fallback().theme, "dark");
    }

    #[test]
    fn missing_everything_falls_back_to_default() {
        let ctx = resolver().resolve(&TenantHints::default());
        assert_eq!(ctx.id.as_str(), DEFAULT_TENANT_ID);
        assert!(ctx.is_fallback());
    }

    #[test]
    fn tenant_id_header_beats_host_mapping() {
        let hints = TenantHints {
            tenant_id: Some("acme".to_string()),
            host: Some("globex.test".to_string()),
            ..Default::default()
        };
        let ctx = resolver().resolve(&hints);
        assert_eq!(ctx.id.as_str(), "acme");
        // database still comes from the host's descriptor
        assert_eq!(ctx.database, DEFAULT_DATABASE);
        assert_eq!(ctx.descriptor.id, "globex");
        assert_eq!(ctx.source, TenantSource::Override);
    }

    #[test]
    fn domain_header_beats_host_and_database_header_overrides() {
        let hints = TenantHints {
            domain: Some("acme.test".to_string()),
            database: Some("acme_staging".to_string()),
            host: Some("globex.test".to_string()),
            ..Default::default()
        };
        let ctx = resolver().resolve(&hints);
        assert_eq!(ctx.id.as_str(), "acme");
        assert_eq!(ctx.database, "acme_staging");
    }

    #[test]
    fn blank_headers_are_ignored() {
        let hints = TenantHints {
            tenant_id: Some("   ".to_string()),
            database: Some(String::new()),
            host: Some("acme.test".to_string()),
            ..Default::default()
        };
        let ctx = resolver().resolve(&hints);
        assert_eq!(ctx.id.as_str(), "acme");
        assert_eq!(ctx.source, TenantSource::Mapped);
    }

    #[test]
    fn loaded_descriptors_never_have_blank_database() {
        let r = resolver();
        let globex = r.sites().get("globex.test").unwrap();
        assert_eq!(globex.database, DEFAULT_DATABASE);
        assert_eq!(globex.directory, "globex");
        assert!(r.sites().databases().contains("acme_db"));
    }

    #[test]
    fn missing_file_serves_default_only() {
        let config = SitesConfig::load_or_default("/definitely/not/here/sites.json");
        assert!(config.is_empty());
        assert_eq!(config.fallback().database, DEFAULT_DATABASE);
    }
}
