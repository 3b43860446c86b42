pub mod admin;
pub mod cors;
pub mod session;
pub mod tenant;

pub use admin::require_admin;
pub use cors::CorsPolicy;
pub use session::{identify, require_session};
pub use tenant::{guard_fallback_writes, resolve_tenant};
