use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_auth::directory::{TenantUsers, USERS_COLLECTION};
use quill_auth::user::{Role, UserDirectory};
use quill_auth_local::verify_password;
use quill_axum::cookie::{clear_session_cookie, session_cookie};
use quill_axum::{map_json_rejection, CurrentUser, QuillAxumResult, QuillState, Tenant, TenantDb};
use quill_core::errors::QuillError;
use quill_core::Filter;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::services::types::{now, CmsState};
use crate::services::users::users_shared::{insert_user, Credentials};
use crate::utils::validator::validated;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePassword {
    #[serde(rename = "currentPassword", default)]
    #[validate(length(min = 1, message = "is required"))]
    pub current_password: String,
    #[serde(rename = "newPassword", default)]
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub new_password: String,
}

pub async fn login(
    State(state): State<QuillState>,
    Tenant(tenant): Tenant,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> QuillAxumResult<Response> {
    let Json(req) = body.map_err(map_json_rejection)?;

    let users: Arc<dyn UserDirectory> = Arc::new(TenantUsers::for_tenant(&state.data, &tenant));
    let user = cms.local.authenticate(users, &req.email, &req.password).await?;

    let token = state.tokens.issue(&tenant.id, &user).await?;
    let cookie = session_cookie(state.auth(), &token)?;
    info!(tenant = %tenant.id, user = %user.id, "signed in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "user": user, "token": token })),
    )
        .into_response())
}

pub async fn register(
    db: TenantDb,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> QuillAxumResult<(StatusCode, Json<Value>)> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Name, email and password are required")?;

    let user = insert_user(
        &db.collection(USERS_COLLECTION),
        &cms.local,
        &req,
        Role::User,
        false,
        "Email already registered",
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Please wait for admin approval.",
            "user": { "id": user.id, "name": user.name, "email": user.email },
        })),
    ))
}

pub async fn logout(State(state): State<QuillState>) -> QuillAxumResult<Response> {
    let cookie = clear_session_cookie(state.auth())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response())
}

pub async fn me(CurrentUser(identity): CurrentUser) -> Json<Value> {
    Json(json!(identity.user))
}

pub async fn change_password(
    State(state): State<QuillState>,
    Tenant(tenant): Tenant,
    CurrentUser(identity): CurrentUser,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<ChangePassword>, JsonRejection>,
) -> QuillAxumResult<Json<Value>> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Invalid password change")?;

    let users = TenantUsers::for_tenant(&state.data, &tenant);
    let record = users
        .find_by_id(identity.id())
        .await?
        .ok_or_else(|| QuillError::not_authenticated("User not found"))?;

    if !verify_password(&req.current_password, &record.password_hash).await? {
        return Err(QuillError::not_authenticated("Current password is incorrect").into());
    }

    let password_hash = cms.local.hash_password(&req.new_password).await?;
    let mut set = serde_json::Map::new();
    set.insert("password".into(), Value::String(password_hash));
    set.insert("updatedAt".into(), json!(now()));
    users
        .collection()
        .update_one(&Filter::by_id(identity.id()), set)
        .await?;

    info!(tenant = %tenant.id, user = %identity.id(), "password changed");
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

/// Whether the tenant has at least one admin.
pub async fn check_admin(db: TenantDb) -> QuillAxumResult<Json<Value>> {
    let admins = db
        .collection(USERS_COLLECTION)
        .count_documents(&Filter::new().eq("role", Role::Admin.as_str()))
        .await?;
    Ok(Json(json!({ "exists": admins > 0 })))
}

/// First-run bootstrap: creates an approved admin while the tenant has none.
pub async fn create_admin(
    db: TenantDb,
    Extension(cms): Extension<Arc<CmsState>>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> QuillAxumResult<(StatusCode, Json<Value>)> {
    let Json(req) = body.map_err(map_json_rejection)?;
    let req = validated(req, "Name, email and password are required")?;

    let users = db.collection(USERS_COLLECTION);
    let admins = users
        .count_documents(&Filter::new().eq("role", Role::Admin.as_str()))
        .await?;
    if admins > 0 {
        return Err(QuillError::conflict("Admin user already exists").into());
    }

    let admin = insert_user(&users, &cms.local, &req, Role::Admin, true, "User already exists").await?;
    info!(tenant = %db.tenant().id, user = %admin.id, "bootstrap admin created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Admin user created successfully",
            "user": { "id": admin.id, "email": admin.email, "name": admin.name },
        })),
    ))
}
