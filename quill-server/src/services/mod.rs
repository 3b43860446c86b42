pub mod auth;
pub mod categories;
pub mod posts;
pub mod social;
pub mod system;
pub mod types;
pub mod uploads;
pub mod users;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use quill_axum::middlewares::{require_admin, require_session};
use quill_axum::QuillState;

use self::auth::auth_service;
use self::categories::categories_service;
use self::posts::posts_service;
use self::social::social_service;
use self::system::system_service;
use self::types::CmsState;
use self::uploads::uploads_service;
use self::users::users_service;

/// Room for multipart framing around the largest accepted file.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// The CMS route table, relative to the API prefix.
pub fn configure(state: &QuillState, cms: Arc<CmsState>) -> Router<QuillState> {
    let public = Router::new()
        .route("/version", get(system_service::version))
        .route("/health", get(system_service::health))
        .route("/auth/login", post(auth_service::login))
        .route("/auth/register", post(auth_service::register))
        .route("/auth/check-admin", get(auth_service::check_admin))
        .route("/auth/create-admin", post(auth_service::create_admin))
        .route("/posts", get(posts_service::list))
        .route("/posts/{post}", get(posts_service::by_slug))
        .route("/categories", get(categories_service::list));

    let protected = Router::new()
        .route("/auth/logout", post(auth_service::logout))
        .route("/auth/me", get(auth_service::me))
        .route("/auth/change-password", post(auth_service::change_password))
        .route("/posts", post(posts_service::create))
        .route("/posts/id/{id}", get(posts_service::by_id))
        .route(
            "/posts/{post}",
            put(posts_service::update).delete(posts_service::remove),
        )
        .route("/categories", post(categories_service::create))
        .route(
            "/categories/{id}",
            put(categories_service::update).delete(categories_service::remove),
        )
        .route(
            "/upload",
            post(uploads_service::upload)
                .layer(DefaultBodyLimit::max(cms.max_upload_bytes + FORM_OVERHEAD_BYTES)),
        )
        .route("/users/{id}", put(users_service::update))
        .route("/social/credentials", post(social_service::save_credentials))
        .route("/social/publish", post(social_service::publish))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    // require_admin reads the identity, so the session layer must wrap it
    let admin = Router::new()
        .route(
            "/admin/users",
            get(users_service::list).post(users_service::create),
        )
        .route(
            "/admin/users/{id}",
            get(users_service::get).delete(users_service::remove),
        )
        .route("/admin/users/{id}/approve", put(users_service::approve))
        .route("/admin/users/{id}/role", put(users_service::set_role))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    public
        .merge(protected)
        .merge(admin)
        .layer(Extension(cms))
}
