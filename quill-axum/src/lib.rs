//! quill-axum: Axum integration for Quill CMS.
//!
//! [`QuillApp`] wires the request pipeline every route shares: CORS, request
//! ids and tracing, tenant resolution and the fallback write guard. Protected
//! route groups add [`middlewares::require_session`] and, for admin routes,
//! [`middlewares::require_admin`]. Handlers receive typed values through the
//! extractors in [`extract`] instead of reading request extensions.

pub mod app;
pub mod cookie;
pub mod extract;
pub mod middlewares;
pub mod state;
mod error;

pub use app::QuillApp;
pub use error::{map_json_rejection, QuillAxumError, QuillAxumResult};
pub use extract::{CurrentUser, MaybeUser, Tenant, TenantDb};
pub use state::{AppContext, AppContextBuilder, QuillState, TenancyPolicy};

pub use axum;
