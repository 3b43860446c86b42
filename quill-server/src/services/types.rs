use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use quill_auth_local::LocalStrategy;
use quill_core::errors::QuillError;
use quill_core::{Document, QuillConfigSnapshot};
use quill_social::PublisherSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config;

pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application collaborators shared by the CMS handlers.
#[derive(Clone)]
pub struct CmsState {
    pub local: LocalStrategy,
    pub publishers: PublisherSet,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub version_file: PathBuf,
    pub public_site_url: Option<String>,
}

impl CmsState {
    pub fn from_config(config: &QuillConfigSnapshot) -> Result<Self> {
        Ok(Self {
            local: LocalStrategy::new(),
            publishers: PublisherSet::standard()?,
            upload_dir: config
                .get_string(config::UPLOAD_DIR)
                .unwrap_or_else(|| "./uploads".to_string())
                .into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            version_file: config
                .get_string(config::VERSION_FILE)
                .unwrap_or_else(|| "version.txt".to_string())
                .into(),
            public_site_url: config.get_string(config::PUBLIC_SITE_URL),
        })
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(QuillError::general_error("Record is not an object").into_anyhow()),
        Err(e) => Err(QuillError::general_error("Failed to encode record")
            .with_source(e.into())
            .into_anyhow()),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        QuillError::general_error("Corrupt record")
            .with_source(e.into())
            .into_anyhow()
    })
}

/// Reject path ids the store could never have issued.
pub fn parse_id<'a>(raw: &'a str, what: &str) -> Result<&'a str> {
    let id = raw.trim();
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(QuillError::bad_request(format!("Invalid {what} ID")).into_anyhow());
    }
    Ok(id)
}
