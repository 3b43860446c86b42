//! Tenant-scoped data access.
//!
//! [`DataAccessor`] owns one database handle per database name and hands out
//! [`ScopedCollection`]s bound to a tenant's database. When the set of
//! configured databases is known, only those handles are kept; names that
//! arrive through request overrides get a handle for that call alone. Every operation on a
//! scoped collection runs under a deadline and surfaces store failures as
//! [`QuillError`]s: timeouts and connectivity problems become `Unavailable`,
//! anything else `GeneralError`.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error};

use crate::errors::{QuillError, QuillResult};
use crate::store::{
    Collection, Database, Document, DocumentStore, Filter, FindOptions, StoreError, UpdateResult,
};
use crate::tenant::{TenantContext, DEFAULT_DATABASE};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DataAccessor {
    store: Arc<dyn DocumentStore>,
    handles: RwLock<HashMap<String, Arc<dyn Database>>>,
    known: Option<BTreeSet<String>>,
    default_database: String,
    timeout: Duration,
}

impl DataAccessor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            handles: RwLock::new(HashMap::new()),
            known: None,
            default_database: DEFAULT_DATABASE.to_string(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }

    /// Restrict the handle cache to `databases`.
    pub fn with_known_databases(mut self, databases: BTreeSet<String>) -> Self {
        self.known = Some(databases);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Memoized handle for `database`; at most one is ever created per
    /// configured name.
    pub fn handle_for(&self, database: &str) -> Arc<dyn Database> {
        if let Some(known) = &self.known {
            if !known.contains(database) {
                debug!(%database, "unconfigured database, handle not cached");
                return self.store.database(database);
            }
        }

        if let Some(handle) = self.handles.read().get(database) {
            return Arc::clone(handle);
        }

        let mut handles = self.handles.write();
        // another caller may have won the race between the two locks
        if let Some(handle) = handles.get(database) {
            return Arc::clone(handle);
        }

        debug!(%database, "opening database handle");
        let handle = self.store.database(database);
        handles.insert(database.to_string(), Arc::clone(&handle));
        handle
    }

    /// Number of cached handles.
    pub fn cached_handles(&self) -> usize {
        self.handles.read().len()
    }

    /// Collection in the tenant's database. `None` is only for work outside a
    /// request and uses the default database.
    pub fn collection_for(&self, tenant: Option<&TenantContext>, name: &str) -> ScopedCollection {
        let database = match tenant {
            Some(t) => t.database.as_str(),
            None => {
                debug!(collection = name, "no tenant context, using default database");
                self.default_database.as_str()
            }
        };
        let handle = self.handle_for(database);
        ScopedCollection {
            database: database.to_string(),
            name: name.to_string(),
            inner: handle.collection(name),
            timeout: self.timeout,
        }
    }

    /// Round-trip to the store under `deadline`.
    pub async fn ping(&self, deadline: Duration) -> QuillResult<()> {
        guarded("ping", "-", deadline, self.store.ping()).await
    }
}

/// A collection bound to one tenant database.
#[derive(Clone)]
pub struct ScopedCollection {
    database: String,
    name: String,
    inner: Arc<dyn Collection>,
    timeout: Duration,
}

impl ScopedCollection {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn find(&self, filter: &Filter, options: FindOptions) -> QuillResult<Vec<Document>> {
        guarded("find", &self.name, self.timeout, self.inner.find(filter, options)).await
    }

    pub async fn find_one(&self, filter: &Filter) -> QuillResult<Option<Document>> {
        guarded("find_one", &self.name, self.timeout, self.inner.find_one(filter)).await
    }

    pub async fn insert_one(&self, doc: Document) -> QuillResult<String> {
        guarded("insert_one", &self.name, self.timeout, self.inner.insert_one(doc)).await
    }

    pub async fn update_one(&self, filter: &Filter, set: Document) -> QuillResult<UpdateResult> {
        guarded("update_one", &self.name, self.timeout, self.inner.update_one(filter, set)).await
    }

    pub async fn delete_one(&self, filter: &Filter) -> QuillResult<u64> {
        guarded("delete_one", &self.name, self.timeout, self.inner.delete_one(filter)).await
    }

    pub async fn count_documents(&self, filter: &Filter) -> QuillResult<u64> {
        guarded("count_documents", &self.name, self.timeout, self.inner.count_documents(filter)).await
    }
}

fn looks_unavailable(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("context deadline exceeded") || lower.contains("server selection timeout")
}

/// Map a store failure onto the client-facing taxonomy.
pub fn classify_store_error(err: StoreError) -> QuillError {
    let unavailable = match &err {
        StoreError::Timeout | StoreError::Unreachable(_) => true,
        StoreError::Backend(msg) => looks_unavailable(msg),
        StoreError::InvalidDocument(_) => false,
    };
    let base = if unavailable {
        QuillError::unavailable("Database temporarily unavailable - please try again")
    } else {
        QuillError::general_error("Database error")
    };
    base.with_source(anyhow::Error::new(err))
}

async fn guarded<T, F>(op: &str, collection: &str, deadline: Duration, fut: F) -> QuillResult<T>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            error!(op, collection, error = %err, "store operation failed");
            Err(classify_store_error(err).into_anyhow())
        }
        Err(_) => {
            error!(op, collection, ?deadline, "store operation timed out");
            Err(classify_store_error(StoreError::Timeout).into_anyhow())
        }
    }
}
