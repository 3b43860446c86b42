//! quill-core: framework-agnostic core for Quill CMS.
//!
//! Tenant resolution, tenant-scoped data access, configuration and the
//! error taxonomy shared by every other crate in the workspace.

pub mod accessor;
pub mod config;
pub mod errors;
pub mod store;
pub mod tenant;

pub use accessor::{classify_store_error, DataAccessor, ScopedCollection};
pub use config::{QuillConfig, QuillConfigSnapshot};
pub use errors::{ErrorKind, QuillError, QuillResult};
pub use store::{
    Collection, Database, Document, DocumentStore, Filter, FindOptions, MemoryStore, SortOrder,
    StoreError, StoreResult, UpdateResult,
};
pub use tenant::{
    SitesConfig, TenantContext, TenantDescriptor, TenantHints, TenantId, TenantResolver,
    TenantSource, DEFAULT_DATABASE, DEFAULT_TENANT_ID,
};
