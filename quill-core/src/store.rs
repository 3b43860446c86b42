//! Document-store seam.
//!
//! Handlers talk to collections of JSON documents through these traits; the
//! concrete driver is chosen at startup. [`MemoryStore`] is the in-process
//! implementation used by tests and single-node development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub type Document = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("store operation timed out")]
    Timeout,

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Conjunction of equality tests on top-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    terms: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq("id", id.into())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.terms
            .iter()
            .all(|(field, expected)| doc.get(field).unwrap_or(&Value::Null) == expected)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn sorted_by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: Some((field.into(), order)),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

#[async_trait]
pub trait Collection: Send + Sync {
    async fn find(&self, filter: &Filter, options: FindOptions) -> StoreResult<Vec<Document>>;

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Insert and return the document id, assigning one when absent.
    async fn insert_one(&self, doc: Document) -> StoreResult<String>;

    /// Merge `set` into the first matching document.
    async fn update_one(&self, filter: &Filter, set: Document) -> StoreResult<UpdateResult>;

    async fn delete_one(&self, filter: &Filter) -> StoreResult<u64>;

    async fn count_documents(&self, filter: &Filter) -> StoreResult<u64>;
}

pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    fn collection(&self, name: &str) -> Arc<dyn Collection>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Handle to a named database. Cheap and synchronous, like a driver's
    /// database handle; connection work happens lazily on first use.
    fn database(&self, name: &str) -> Arc<dyn Database>;

    async fn ping(&self) -> StoreResult<()>;
}

// ---- in-memory backend ----

type CollectionData = Arc<RwLock<Vec<Document>>>;
type DatabaseData = Arc<RwLock<HashMap<String, CollectionData>>>;

/// In-process store. Handles for the same database name share data.
#[derive(Default, Clone)]
pub struct MemoryStore {
    databases: Arc<RwLock<HashMap<String, DatabaseData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_for(&self, name: &str) -> DatabaseData {
        if let Some(data) = self.databases.read().get(name) {
            return Arc::clone(data);
        }
        let mut dbs = self.databases.write();
        Arc::clone(dbs.entry(name.to_string()).or_default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self, name: &str) -> Arc<dyn Database> {
        Arc::new(MemoryDatabase {
            name: name.to_string(),
            collections: self.data_for(name),
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct MemoryDatabase {
    name: String,
    collections: DatabaseData,
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        let existing = self.collections.read().get(name).cloned();
        let docs = match existing {
            Some(docs) => docs,
            None => {
                let mut map = self.collections.write();
                Arc::clone(map.entry(name.to_string()).or_default())
            }
        };
        Arc::new(MemoryCollection { docs })
    }
}

pub struct MemoryCollection {
    docs: CollectionData,
}

fn compare_field(a: &Document, b: &Document, field: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.get(field), b.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        // RFC 3339 timestamps order correctly as strings.
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn find(&self, filter: &Filter, options: FindOptions) -> StoreResult<Vec<Document>> {
        let mut out: Vec<Document> = self
            .docs
            .read()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();

        if let Some((field, order)) = &options.sort {
            out.sort_by(|a, b| {
                let ord = compare_field(a, b, field);
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = options.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self.docs.read().iter().find(|d| filter.matches(d)).cloned())
    }

    async fn insert_one(&self, mut doc: Document) -> StoreResult<String> {
        let id = match doc.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                let id = Uuid::new_v4().simple().to_string();
                doc.insert("id".to_string(), Value::String(id.clone()));
                id
            }
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "id must be a string, got {other}"
                )))
            }
        };

        let mut docs = self.docs.write();
        if docs
            .iter()
            .any(|d| d.get("id").and_then(Value::as_str) == Some(id.as_str()))
        {
            return Err(StoreError::InvalidDocument(format!("duplicate id {id}")));
        }
        docs.push(doc);
        Ok(id)
    }

    async fn update_one(&self, filter: &Filter, set: Document) -> StoreResult<UpdateResult> {
        let mut docs = self.docs.write();
        let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(UpdateResult::default());
        };

        let mut modified = false;
        for (key, value) in set {
            if key == "id" {
                continue;
            }
            if doc.get(&key) != Some(&value) {
                doc.insert(key, value);
                modified = true;
            }
        }
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
        })
    }

    async fn delete_one(&self, filter: &Filter) -> StoreResult<u64> {
        let mut docs = self.docs.write();
        match docs.iter().position(|d| filter.matches(d)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        Ok(self.docs.read().iter().filter(|d| filter.matches(d)).count() as u64)
    }
}
