//! Session middleware.
//!
//! A request passes only when, in order: the session cookie is present and
//! non-empty, the token verifies against the request tenant's secret and has
//! not expired, it names a user, and that user exists in the tenant's store.
//! The loaded user is attached as an [`Identity`].

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use quill_auth::directory::TenantUsers;
use quill_auth::user::{Identity, UserDirectory};
use quill_core::errors::QuillError;
use quill_core::TenantContext;
use tracing::debug;

use crate::cookie::read_cookie;
use crate::error::QuillAxumError;
use crate::middlewares::tenant::tenant_of;
use crate::state::{AppContext, QuillState};

/// Establish the identity behind a request's session cookie.
pub async fn identify(
    ctx: &AppContext,
    tenant: &TenantContext,
    headers: &HeaderMap,
) -> anyhow::Result<Identity> {
    let token = read_cookie(headers, &ctx.auth().cookie_name)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| QuillError::not_authenticated("Authentication required").into_anyhow())?;

    let claims = ctx.tokens.verify(&tenant.id, &token).await?;

    let record = TenantUsers::for_tenant(&ctx.data, tenant)
        .find_by_id(&claims.user_id)
        .await?
        .ok_or_else(|| {
            debug!(tenant = %tenant.id, user = %claims.user_id, "session user no longer exists");
            QuillError::not_authenticated("User not found").into_anyhow()
        })?;

    Ok(Identity::new(record.into_user()))
}

pub async fn require_session(
    State(state): State<QuillState>,
    mut req: Request,
    next: Next,
) -> Result<Response, QuillAxumError> {
    let tenant = tenant_of(&state, req.extensions(), req.headers(), req.uri().host());
    let identity = identify(&state, &tenant, req.headers()).await?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
