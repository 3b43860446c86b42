//! Typed request-scoped extractors.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use quill_auth::user::Identity;
use quill_core::errors::QuillError;
use quill_core::{ScopedCollection, TenantContext};
use tracing::debug;

use crate::error::QuillAxumError;
use crate::middlewares::session::identify;
use crate::middlewares::tenant::tenant_of;
use crate::state::{AppContext, QuillState};

/// The request's tenant.
#[derive(Debug, Clone)]
pub struct Tenant(pub TenantContext);

impl FromRequestParts<QuillState> for Tenant {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &QuillState) -> Result<Self, Self::Rejection> {
        Ok(Tenant(tenant_of(state, &parts.extensions, &parts.headers, parts.uri.host())))
    }
}

/// The authenticated user. Rejects with 401 outside `require_session`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = QuillAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| QuillError::not_authenticated("Authentication required").into())
    }
}

/// The authenticated user if the request carries a valid session. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Identity>);

impl FromRequestParts<QuillState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &QuillState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(MaybeUser(Some(identity.clone())));
        }
        let tenant = tenant_of(state, &parts.extensions, &parts.headers, parts.uri.host());
        match identify(state, &tenant, &parts.headers).await {
            Ok(identity) => Ok(MaybeUser(Some(identity))),
            Err(err) => {
                debug!(error = %err, "treating request as anonymous");
                Ok(MaybeUser(None))
            }
        }
    }
}

/// Collections in the request tenant's database.
#[derive(Clone)]
pub struct TenantDb {
    tenant: TenantContext,
    ctx: Arc<AppContext>,
}

impl TenantDb {
    pub fn tenant(&self) -> &TenantContext {
        &self.tenant
    }

    pub fn collection(&self, name: &str) -> ScopedCollection {
        self.ctx.data.collection_for(Some(&self.tenant), name)
    }
}

impl FromRequestParts<QuillState> for TenantDb {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &QuillState) -> Result<Self, Self::Rejection> {
        let tenant = tenant_of(state, &parts.extensions, &parts.headers, parts.uri.host());
        Ok(TenantDb {
            tenant,
            ctx: Arc::clone(&state.ctx),
        })
    }
}
