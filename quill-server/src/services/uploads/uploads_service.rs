use std::path::Path;
use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Extension, Multipart};
use axum::http::StatusCode;
use axum::Json;
use quill_axum::{QuillAxumResult, Tenant};
use quill_core::errors::QuillError;
use serde_json::{json, Value};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::services::types::{now, CmsState};
use crate::services::uploads::uploads_shared::{image_extension, stored_file_name, tenant_directory};

const FILE_FIELD: &str = "file";

fn form_error(err: MultipartError) -> anyhow::Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return QuillError::payload_too_large("File too large").into_anyhow();
    }
    QuillError::bad_request("Failed to parse form")
        .with_source(err.into())
        .into_anyhow()
}

fn io_error(err: std::io::Error) -> anyhow::Error {
    QuillError::general_error("Failed to store file")
        .with_source(err.into())
        .into_anyhow()
}

/// Stream one field to `path`, giving up once it passes `max_bytes`.
async fn write_field(mut field: Field<'_>, path: &Path, max_bytes: usize) -> anyhow::Result<usize> {
    let mut file = File::create(path).await.map_err(io_error)?;
    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await.map_err(form_error)? {
        written += chunk.len();
        if written > max_bytes {
            return Err(QuillError::payload_too_large("File too large").into_anyhow());
        }
        file.write_all(&chunk).await.map_err(io_error)?;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

/// Store an image for the request's tenant and answer with its public URL.
pub async fn upload(
    Tenant(tenant): Tenant,
    Extension(cms): Extension<Arc<CmsState>>,
    mut multipart: Multipart,
) -> QuillAxumResult<Json<Value>> {
    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let ext = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| QuillError::bad_request("Invalid file type"))?;

        let directory = tenant_directory(&tenant);
        let target_dir = cms.upload_dir.join(&directory);
        fs::create_dir_all(&target_dir).await.map_err(io_error)?;

        let file_name = stored_file_name(now().timestamp(), &ext);
        let path = target_dir.join(&file_name);
        let size = match write_field(field, &path, cms.max_upload_bytes).await {
            Ok(size) => size,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(error = %cleanup, path = %path.display(), "could not remove partial upload");
                }
                return Err(err.into());
            }
        };

        info!(tenant = %tenant.id, file = %file_name, size, "file uploaded");
        return Ok(Json(json!({ "url": format!("/uploads/{directory}/{file_name}") })));
    }
    Err(QuillError::bad_request("No file uploaded").into())
}
