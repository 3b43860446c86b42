use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use quill_auth::directory::{decode_user_record, USERS_COLLECTION};
use quill_auth::user::User;
use quill_axum::{map_json_rejection, CurrentUser, MaybeUser, QuillAxumResult, TenantDb};
use quill_core::errors::QuillError;
use quill_core::{Filter, FindOptions, SortOrder};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::services::categories::categories_service::find_by_slug;
use crate::services::categories::categories_shared::DEFAULT_KIND;
use crate::services::categories::{Category, CATEGORIES_COLLECTION};
use crate::services::posts::posts_shared::{
    post_slug, reading_time, NewPost, Post, PostPatch, PostQuery, PostView, POSTS_COLLECTION,
};
use crate::services::types::{from_document, new_id, now, parse_id, to_document};
use crate::utils::validator::validated;

fn post_not_found() -> QuillError {
    QuillError::not_found("Post not found")
}

/// Attach the author and category records. Dangling references are left out.
pub async fn enrich(db: &TenantDb, post: Post) -> anyhow::Result<PostView> {
    let author_data = if post.author.is_empty() {
        None
    } else {
        db.collection(USERS_COLLECTION)
            .find_one(&Filter::by_id(post.author.as_str()))
            .await?
            .map(|doc| decode_user_record(doc).map(|r| r.into_user()))
            .transpose()?
    };
    let category_data = if post.category.is_empty() {
        None
    } else {
        db.collection(CATEGORIES_COLLECTION)
            .find_one(&Filter::by_id(post.category.as_str()))
            .await?
            .map(from_document::<Category>)
            .transpose()?
    };
    Ok(PostView {
        post,
        author_data: author_data.map(without_social),
        category_data,
    })
}

fn without_social(mut user: User) -> User {
    user.social = None;
    user
}

/// Posts newest first. Anonymous callers only see published posts.
pub async fn list(
    db: TenantDb,
    MaybeUser(identity): MaybeUser,
    Query(query): Query<PostQuery>,
) -> QuillAxumResult<Json<Vec<PostView>>> {
    let mut filter = Filter::new();
    if identity.is_none() {
        filter = filter.eq("published", true);
    }
    let kind = query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty());
    if let Some(kind) = kind {
        filter = filter.eq("type", kind);
    }
    if let Some(slug) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let categories = db.collection(CATEGORIES_COLLECTION);
        match find_by_slug(&categories, slug, kind).await? {
            Some(category) => filter = filter.eq("category", category.id),
            None => debug!(slug, "unknown category slug, not filtering"),
        }
    }

    let docs = db
        .collection(POSTS_COLLECTION)
        .find(&filter, FindOptions::sorted_by("createdAt", SortOrder::Descending))
        .await?;

    let mut views = Vec::with_capacity(docs.len());
    for doc in docs {
        let post: Post = from_document(doc)?;
        views.push(enrich(&db, post).await?);
    }
    Ok(Json(views))
}

/// A published post by slug.
pub async fn by_slug(db: TenantDb, Path(slug): Path<String>) -> QuillAxumResult<Json<PostView>> {
    let filter = Filter::new().eq("slug", slug.as_str()).eq("published", true);
    let doc = db
        .collection(POSTS_COLLECTION)
        .find_one(&filter)
        .await?
        .ok_or_else(post_not_found)?;
    let post: Post = from_document(doc)?;
    Ok(Json(enrich(&db, post).await?))
}

/// Any post by id, drafts included.
pub async fn by_id(db: TenantDb, Path(id): Path<String>) -> QuillAxumResult<Json<PostView>> {
    let id = parse_id(&id, "post")?;
    let doc = db
        .collection(POSTS_COLLECTION)
        .find_one(&Filter::by_id(id))
        .await?
        .ok_or_else(post_not_found)?;
    let post: Post = from_document(doc)?;
    Ok(Json(enrich(&db, post).await?))
}

pub async fn create(
    db: TenantDb,
    CurrentUser(identity): CurrentUser,
    body: Result<Json<NewPost>, JsonRejection>,
) -> QuillAxumResult<(StatusCode, Json<Post>)> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Post title is required")?;

    let created = now();
    let slug = match req.slug.trim() {
        "" => post_slug(&req.title, created),
        given => given.to_string(),
    };
    let kind = match req.kind.trim() {
        "" => DEFAULT_KIND.to_string(),
        given => given.to_string(),
    };
    let post = Post {
        id: new_id(),
        title: req.title.trim().to_string(),
        slug,
        reading_time: reading_time(&req.content),
        content: req.content,
        description: req.description,
        kind,
        author: identity.id().to_string(),
        category: req.category,
        cover_image: req.cover_image.filter(|c| !c.is_empty()),
        order: req.order,
        parent_doc: req.parent_doc.filter(|p| !p.is_empty()),
        published: req.published,
        created_at: created,
        updated_at: created,
    };
    db.collection(POSTS_COLLECTION)
        .insert_one(to_document(&post)?)
        .await?;
    info!(tenant = %db.tenant().id, post = %post.id, slug = %post.slug, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update(
    db: TenantDb,
    Path(id): Path<String>,
    body: Result<Json<PostPatch>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "post")?;
    let Json(patch) = body.map_err(map_json_rejection)?;
    let patch = validated(patch, "Invalid post")?;

    let mut set = to_document(&patch)?;
    if let Some(content) = &patch.content {
        set.insert("readingTime".into(), json!(reading_time(content)));
    }
    set.insert("updatedAt".into(), json!(now()));

    let result = db
        .collection(POSTS_COLLECTION)
        .update_one(&Filter::by_id(id), set)
        .await?;
    if result.matched == 0 {
        return Err(post_not_found().into());
    }
    Ok(Json(json!({ "message": "Post updated successfully" })))
}

pub async fn remove(db: TenantDb, Path(id): Path<String>) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "post")?;
    let deleted = db
        .collection(POSTS_COLLECTION)
        .delete_one(&Filter::by_id(id))
        .await?;
    if deleted == 0 {
        return Err(post_not_found().into());
    }
    info!(tenant = %db.tenant().id, post = %id, "post deleted");
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}
