//! [`UserDirectory`] over a tenant's `users` collection.

use async_trait::async_trait;
use quill_core::errors::QuillError;
use quill_core::{DataAccessor, Document, Filter, ScopedCollection, TenantContext};
use serde_json::Value;

use crate::user::{UserDirectory, UserRecord};

pub const USERS_COLLECTION: &str = "users";

/// Decode a stored user document.
pub fn decode_user_record(doc: Document) -> anyhow::Result<UserRecord> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        QuillError::general_error("Corrupt user record")
            .with_source(e.into())
            .into_anyhow()
    })
}

#[derive(Clone)]
pub struct TenantUsers {
    users: ScopedCollection,
}

impl TenantUsers {
    pub fn new(users: ScopedCollection) -> Self {
        Self { users }
    }

    pub fn for_tenant(data: &DataAccessor, tenant: &TenantContext) -> Self {
        Self::new(data.collection_for(Some(tenant), USERS_COLLECTION))
    }

    pub fn collection(&self) -> &ScopedCollection {
        &self.users
    }
}

#[async_trait]
impl UserDirectory for TenantUsers {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        self.users
            .find_one(&Filter::new().eq("email", email))
            .await?
            .map(decode_user_record)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<UserRecord>> {
        self.users
            .find_one(&Filter::by_id(id))
            .await?
            .map(decode_user_record)
            .transpose()
    }
}
