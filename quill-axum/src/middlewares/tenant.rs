// Tenant resolution and the fallback write guard.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use quill_core::errors::QuillError;
use quill_core::{TenantContext, TenantHints};
use tracing::warn;

use crate::error::QuillAxumError;
use crate::state::{AppContext, QuillState};

pub const TENANT_DOMAIN_HEADER: &str = "x-tenant-domain";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const SITE_DATABASE_HEADER: &str = "x-site-database";

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn hints_from_request(headers: &HeaderMap, uri_host: Option<&str>) -> TenantHints {
    TenantHints {
        domain: header_str(headers, TENANT_DOMAIN_HEADER),
        tenant_id: header_str(headers, TENANT_ID_HEADER),
        database: header_str(headers, SITE_DATABASE_HEADER),
        host: header_str(headers, header::HOST.as_str()).or_else(|| uri_host.map(str::to_string)),
    }
}

/// The tenant attached by [`resolve_tenant`], or a fresh resolution when the
/// middleware did not run for this request.
pub fn tenant_of(
    ctx: &AppContext,
    extensions: &axum::http::Extensions,
    headers: &HeaderMap,
    uri_host: Option<&str>,
) -> TenantContext {
    extensions
        .get::<TenantContext>()
        .cloned()
        .unwrap_or_else(|| ctx.resolver.resolve(&hints_from_request(headers, uri_host)))
}

pub async fn resolve_tenant(State(state): State<QuillState>, mut req: Request, next: Next) -> Response {
    let hints = hints_from_request(req.headers(), req.uri().host());
    let tenant = state.resolver.resolve(&hints);
    req.extensions_mut().insert(tenant);
    next.run(req).await
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// With `tenancy.strict_writes` on, refuse writes that would land in the
/// default tenant because nothing identified the site.
pub async fn guard_fallback_writes(
    State(state): State<QuillState>,
    req: Request,
    next: Next,
) -> Result<Response, QuillAxumError> {
    if state.tenancy.strict_writes && !is_safe(req.method()) {
        let fallback = req
            .extensions()
            .get::<TenantContext>()
            .map_or(true, TenantContext::is_fallback);
        if fallback {
            warn!(method = %req.method(), path = %req.uri().path(), "write refused for unidentified site");
            return Err(QuillError::forbidden("Unknown site: writes require a configured tenant").into());
        }
    }
    Ok(next.run(req).await)
}
