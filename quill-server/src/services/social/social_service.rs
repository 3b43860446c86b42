use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::Json;
use quill_auth::directory::{decode_user_record, USERS_COLLECTION};
use quill_auth::user::SocialCredentials;
use quill_axum::{map_json_rejection, CurrentUser, QuillAxumResult, TenantDb};
use quill_core::errors::QuillError;
use quill_core::{Document, Filter, TenantContext};
use quill_social::{PublishContent, PublishRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::services::posts::{Post, POSTS_COLLECTION};
use crate::services::types::{from_document, now, parse_id, to_document, CmsState};

#[derive(Debug, Deserialize)]
pub struct PublishBody {
    #[serde(rename = "postId", default)]
    pub post_id: String,
    #[serde(default)]
    pub platforms: Vec<PublishRequest>,
}

/// Where readers find a post: the configured public site, else the tenant's domain.
pub fn public_post_url(public_site_url: Option<&str>, tenant: &TenantContext, slug: &str) -> String {
    match public_site_url {
        Some(base) => format!("{}/blog/{slug}", base.trim_end_matches('/')),
        None => {
            let host = if tenant.domain.is_empty() {
                "localhost"
            } else {
                tenant.domain.as_str()
            };
            format!("https://{host}/blog/{slug}")
        }
    }
}

/// Replace the caller's publishing credentials.
pub async fn save_credentials(
    db: TenantDb,
    CurrentUser(identity): CurrentUser,
    body: Result<Json<SocialCredentials>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let Json(social) = body.map_err(map_json_rejection)?;

    let mut set = Document::new();
    set.insert("social".into(), Value::Object(to_document(&social)?));
    set.insert("updatedAt".into(), json!(now()));
    let result = db
        .collection(USERS_COLLECTION)
        .update_one(&Filter::by_id(identity.id()), set)
        .await?;
    if result.matched == 0 {
        return Err(QuillError::not_found("User not found").into());
    }
    info!(tenant = %db.tenant().id, user = %identity.id(), "social credentials saved");
    Ok(Json(json!({ "success": true })))
}

/// Share a post on the requested platforms with the caller's credentials.
pub async fn publish(
    db: TenantDb,
    CurrentUser(identity): CurrentUser,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<PublishBody>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let post_id = parse_id(&req.post_id, "post")?;
    if req.platforms.is_empty() {
        return Err(QuillError::bad_request("At least one platform is required").into());
    }

    let post: Post = db
        .collection(POSTS_COLLECTION)
        .find_one(&Filter::by_id(post_id))
        .await?
        .map(from_document)
        .transpose()?
        .ok_or_else(|| QuillError::not_found("Post not found"))?;

    // the session user may have been deleted since the token was issued
    let credentials = db
        .collection(USERS_COLLECTION)
        .find_one(&Filter::by_id(identity.id()))
        .await?
        .map(decode_user_record)
        .transpose()?
        .and_then(|record| record.user.social)
        .unwrap_or_default();

    let content = PublishContent {
        url: public_post_url(cms.public_site_url.as_deref(), db.tenant(), &post.slug),
        title: post.title,
        body: post.description,
        message: None,
        cover_image: post.cover_image,
    };
    let results = cms.publishers.publish(&req.platforms, &credentials, &content).await;
    info!(
        tenant = %db.tenant().id,
        post = %post.id,
        platforms = req.platforms.len(),
        "post shared"
    );
    Ok(Json(json!({ "success": true, "results": results })))
}
