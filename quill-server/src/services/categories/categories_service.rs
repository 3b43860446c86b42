use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use quill_axum::{map_json_rejection, QuillAxumResult, TenantDb};
use quill_core::errors::QuillError;
use quill_core::{Document, Filter, FindOptions, ScopedCollection, SortOrder};
use serde_json::{json, Value};
use tracing::info;

use crate::services::categories::categories_shared::{
    category_slug, Category, CategoryPatch, CategoryQuery, NewCategory, CATEGORIES_COLLECTION,
    DEFAULT_KIND,
};
use crate::services::posts::POSTS_COLLECTION;
use crate::services::types::{from_document, new_id, now, parse_id, to_document};
use crate::utils::validator::validated;

fn kind_or_default(kind: &str) -> String {
    let kind = kind.trim();
    if kind.is_empty() {
        DEFAULT_KIND.to_string()
    } else {
        kind.to_string()
    }
}

async fn insert_category(
    categories: &ScopedCollection,
    name: &str,
    slug: &str,
    kind: String,
) -> anyhow::Result<Category> {
    let category = Category {
        id: new_id(),
        name: name.to_string(),
        slug: slug.to_string(),
        kind,
        created_at: now(),
    };
    categories.insert_one(to_document(&category)?).await?;
    Ok(category)
}

/// Resolve a category slug, preferring a match within `kind`.
pub async fn find_by_slug(
    categories: &ScopedCollection,
    slug: &str,
    kind: Option<&str>,
) -> anyhow::Result<Option<Category>> {
    if let Some(kind) = kind {
        let scoped = Filter::new().eq("slug", slug).eq("type", kind);
        if let Some(doc) = categories.find_one(&scoped).await? {
            return from_document(doc).map(Some);
        }
    }
    categories
        .find_one(&Filter::new().eq("slug", slug))
        .await?
        .map(from_document)
        .transpose()
}

/// Categories sorted by name. Asking for a type that has none seeds a
/// "General" category for it.
pub async fn list(
    db: TenantDb,
    Query(query): Query<CategoryQuery>,
) -> QuillAxumResult<Json<Vec<Category>>> {
    let categories = db.collection(CATEGORIES_COLLECTION);
    let kind = query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty());
    let filter = match kind {
        Some(kind) => Filter::new().eq("type", kind),
        None => Filter::new(),
    };

    let docs = categories
        .find(&filter, FindOptions::sorted_by("name", SortOrder::Ascending))
        .await?;
    let mut found = docs
        .into_iter()
        .map(from_document)
        .collect::<anyhow::Result<Vec<Category>>>()?;

    if found.is_empty() {
        if let Some(kind) = kind {
            let general = insert_category(&categories, "General", "general", kind.to_string()).await?;
            info!(tenant = %db.tenant().id, kind, "seeded default category");
            found.push(general);
        }
    }
    Ok(Json(found))
}

pub async fn create(
    db: TenantDb,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> QuillAxumResult<(StatusCode, Json<Category>)> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Category name is required")?;

    let name = req.name.trim();
    let slug = match req.slug.trim() {
        "" => category_slug(name),
        given => given.to_string(),
    };
    let category = insert_category(
        &db.collection(CATEGORIES_COLLECTION),
        name,
        &slug,
        kind_or_default(&req.kind),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    db: TenantDb,
    Path(id): Path<String>,
    body: Result<Json<CategoryPatch>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "category")?;
    let Json(patch) = body.map_err(map_json_rejection)?;
    let patch = validated(patch, "Invalid category")?;

    let set: Document = to_document(&patch)?;
    let result = db
        .collection(CATEGORIES_COLLECTION)
        .update_one(&Filter::by_id(id), set)
        .await?;
    if result.matched == 0 {
        return Err(QuillError::not_found("Category not found").into());
    }
    Ok(Json(json!({ "message": "Category updated successfully" })))
}

pub async fn remove(db: TenantDb, Path(id): Path<String>) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "category")?;
    let in_use = db
        .collection(POSTS_COLLECTION)
        .count_documents(&Filter::new().eq("category", id))
        .await?;
    if in_use > 0 {
        return Err(QuillError::conflict("Category is in use")
            .with_data(json!({ "posts": in_use }))
            .into());
    }

    let deleted = db
        .collection(CATEGORIES_COLLECTION)
        .delete_one(&Filter::by_id(id))
        .await?;
    if deleted == 0 {
        return Err(QuillError::not_found("Category not found").into());
    }
    info!(tenant = %db.tenant().id, category = %id, "category deleted");
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}
