use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use quill_auth::directory::{decode_user_record, USERS_COLLECTION};
use quill_auth::gate::{ensure_can_assign_role, require_self_or_admin};
use quill_auth::user::{Role, User};
use quill_axum::{map_json_rejection, CurrentUser, QuillAxumResult, TenantDb};
use quill_core::errors::QuillError;
use quill_core::{Document, Filter, FindOptions, SortOrder};
use serde_json::{json, Value};
use tracing::info;

use crate::services::types::{now, parse_id, to_document, CmsState};
use crate::services::users::users_shared::{
    insert_user, parse_role, NewUserRequest, RoleChange, UserUpdate,
};
use crate::utils::validator::validated;

fn user_not_found() -> QuillError {
    QuillError::not_found("User not found")
}

fn stamped(mut set: Document) -> Document {
    set.insert("updatedAt".into(), json!(now()));
    set
}

/// Every user in the tenant, newest first.
pub async fn list(db: TenantDb) -> QuillAxumResult<Json<Vec<User>>> {
    let docs = db
        .collection(USERS_COLLECTION)
        .find(
            &Filter::new(),
            FindOptions::sorted_by("createdAt", SortOrder::Descending),
        )
        .await?;
    let users = docs
        .into_iter()
        .map(|doc| decode_user_record(doc).map(|r| r.into_user()))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(users))
}

pub async fn get(db: TenantDb, Path(id): Path<String>) -> QuillAxumResult<Json<User>> {
    let id = parse_id(&id, "user")?;
    let doc = db
        .collection(USERS_COLLECTION)
        .find_one(&Filter::by_id(id))
        .await?
        .ok_or_else(user_not_found)?;
    let mut user = decode_user_record(doc)?.into_user();
    user.social.get_or_insert_with(Default::default);
    Ok(Json(user))
}

pub async fn create(
    db: TenantDb,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<NewUserRequest>, JsonRejection>,
) -> QuillAxumResult<(StatusCode, Json<Value>)> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Name, email and password are required")?;
    let role = match req.role.as_deref().filter(|r| !r.trim().is_empty()) {
        Some(raw) => parse_role(raw)?,
        None => Role::User,
    };

    let user = insert_user(
        &db.collection(USERS_COLLECTION),
        &cms.local,
        &req.credentials,
        role,
        true,
        "User with this email already exists",
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

pub async fn approve(db: TenantDb, Path(id): Path<String>) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "user")?;
    let mut set = Document::new();
    set.insert("approved".into(), Value::Bool(true));
    let result = db
        .collection(USERS_COLLECTION)
        .update_one(&Filter::by_id(id), stamped(set))
        .await?;
    if result.matched == 0 {
        return Err(user_not_found().into());
    }
    info!(tenant = %db.tenant().id, user = %id, "user approved");
    Ok(Json(json!({ "message": "User approved successfully" })))
}

pub async fn set_role(
    db: TenantDb,
    Path(id): Path<String>,
    body: Result<Json<RoleChange>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "user")?;
    let Json(req) = body.map_err(map_json_rejection)?;
    let role = parse_role(&req.role)?;

    let mut set = Document::new();
    set.insert("role".into(), json!(role));
    let result = db
        .collection(USERS_COLLECTION)
        .update_one(&Filter::by_id(id), stamped(set))
        .await?;
    if result.matched == 0 {
        return Err(user_not_found().into());
    }
    info!(tenant = %db.tenant().id, user = %id, %role, "user role changed");
    Ok(Json(json!({ "message": "User role updated successfully" })))
}

pub async fn remove(
    db: TenantDb,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "user")?;
    if id == identity.id() {
        return Err(QuillError::bad_request("Cannot delete your own account").into());
    }
    let deleted = db
        .collection(USERS_COLLECTION)
        .delete_one(&Filter::by_id(id))
        .await?;
    if deleted == 0 {
        return Err(user_not_found().into());
    }
    info!(tenant = %db.tenant().id, user = %id, "user deleted");
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// Profile update for the user themself or an admin.
pub async fn update(
    db: TenantDb,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let id = parse_id(&id, "user")?;
    require_self_or_admin(&identity, id)?;
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Invalid user update")?;

    let users = db.collection(USERS_COLLECTION);
    let mut set = Document::new();
    if let Some(name) = &req.name {
        set.insert("name".into(), Value::String(name.trim().to_string()));
    }
    if let Some(email) = &req.email {
        let email = email.trim();
        if let Some(existing) = users.find_one(&Filter::new().eq("email", email)).await? {
            if existing.get("id").and_then(Value::as_str) != Some(id) {
                return Err(QuillError::conflict("Email already in use").into());
            }
        }
        set.insert("email".into(), Value::String(email.to_string()));
    }
    if let Some(social) = &req.social {
        set.insert("social".into(), Value::Object(to_document(social)?));
    }
    if let Some(raw) = &req.role {
        ensure_can_assign_role(&identity)?;
        set.insert("role".into(), json!(parse_role(raw)?));
    }

    let result = users.update_one(&Filter::by_id(id), stamped(set)).await?;
    if result.matched == 0 {
        return Err(user_not_found().into());
    }
    Ok(Json(json!({ "success": true })))
}
