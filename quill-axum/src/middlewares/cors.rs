//! Origin policy for browser clients.
//!
//! Allowed origins are mirrored back (never `*`) with credentials allowed.
//! Loopback origins are always accepted; otherwise the origin must be
//! `http(s)://[www.]<domain>` for a domain in `ALLOWED_DOMAINS` or in the
//! sites config. Outside production anything else is accepted too.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, request::Parts, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

pub const CORS_MAX_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_domains: Vec<String>,
    site_domains: Vec<String>,
    production: bool,
}

fn origin_host(origin: &str) -> &str {
    let rest = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(origin);
    let authority = rest.split('/').next().unwrap_or(rest);
    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split(']').next().unwrap_or(v6);
    }
    authority.split(':').next().unwrap_or(authority)
}

impl CorsPolicy {
    pub fn new(allowed_domains: Vec<String>, site_domains: Vec<String>, production: bool) -> Self {
        let clean = |domains: Vec<String>| {
            domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            allowed_domains: clean(allowed_domains),
            site_domains: clean(site_domains),
            production,
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim();
        if origin.is_empty() {
            return false;
        }

        let host = origin_host(origin);
        if host == "localhost" || host == "127.0.0.1" {
            return true;
        }

        let origin = origin.to_ascii_lowercase();
        let listed = self
            .allowed_domains
            .iter()
            .chain(self.site_domains.iter())
            .any(|domain| {
                ["https://", "http://", "https://www.", "http://www."]
                    .iter()
                    .any(|prefix| {
                        origin
                            .strip_prefix(prefix)
                            .is_some_and(|rest| rest == domain)
                    })
            });
        if listed {
            return true;
        }

        if self.production {
            debug!(%origin, "rejecting unlisted origin");
            return false;
        }
        true
    }

    pub fn layer(&self) -> CorsLayer {
        let policy = Arc::new(self.clone());
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    origin.to_str().map(|o| policy.is_allowed(o)).unwrap_or(false)
                },
            ))
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::COOKIE,
                HeaderName::from_static(super::tenant::TENANT_DOMAIN_HEADER),
                HeaderName::from_static(super::tenant::TENANT_ID_HEADER),
                HeaderName::from_static(super::tenant::SITE_DATABASE_HEADER),
            ])
            .max_age(CORS_MAX_AGE)
    }
}
