use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use quill_auth::secrets::EnvLookup;
use quill_auth::user::{Role, User, UserRecord};
use quill_axum::middlewares::{require_admin, require_session};
use quill_axum::{
    map_json_rejection, AppContext, CurrentUser, MaybeUser, QuillApp, QuillAxumError, QuillState,
    Tenant, TenantDb,
};
use quill_core::errors::QuillError;
use quill_core::{Filter, FindOptions, MemoryStore, SitesConfig, TenantContext, TenantHints, TenantId};
use serde_json::{json, Value};
use tower::ServiceExt;

fn context(strict_writes: bool) -> AppContext {
    let sites = SitesConfig::from_json(
        r#"{"acme.test": {"id": "acme", "directory": "acme", "database": "acme_db"}}"#,
    )
    .unwrap();
    let no_env: EnvLookup = Arc::new(|_: &str| None);
    AppContext::builder()
        .sites(sites)
        .store(Arc::new(MemoryStore::new()))
        .env(no_env)
        .allowed_domains(vec!["partner.io".into()])
        .production(true)
        .strict_writes(strict_writes)
        .build()
        .unwrap()
}

fn routes(state: &QuillState) -> Router<QuillState> {
    let public = Router::new()
        .route(
            "/boom",
            get(|| async { Err::<Json<Value>, QuillAxumError>(anyhow::anyhow!("db password is hunter2").into()) }),
        )
        .route(
            "/taken",
            get(|| async { Err::<Json<Value>, QuillAxumError>(QuillError::conflict("Email already registered").into()) }),
        )
        .route(
            "/echo",
            axum::routing::post(|data: Result<Json<Value>, JsonRejection>| async move {
                let Json(data) = data.map_err(map_json_rejection)?;
                Ok::<_, QuillAxumError>(Json(data))
            }),
        )
        .route(
            "/whoami",
            get(|Tenant(tenant): Tenant| async move {
                Json(json!({"tenant": tenant.id, "database": tenant.database}))
            }),
        )
        .route(
            "/posts",
            get(|MaybeUser(user): MaybeUser| async move {
                Json(json!({"drafts": user.is_some()}))
            })
            .post(|db: TenantDb| async move {
                let id = db.collection("posts").insert_one(Default::default()).await?;
                Ok::<_, QuillAxumError>(Json(json!({"id": id})))
            }),
        );

    let protected = Router::new()
        .route(
            "/me",
            get(|CurrentUser(identity): CurrentUser| async move { Json(json!({"id": identity.id()})) }),
        )
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let admin = Router::new()
        .route("/admin/ping", get(|| async { "pong" }))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    public.merge(protected).merge(admin)
}

fn app(strict_writes: bool) -> (QuillState, Router) {
    let app = QuillApp::new(context(strict_writes));
    let state = app.state.clone();
    let router = app.use_router("/api", routes(&state)).into_router();
    (state, router)
}

fn tenant(state: &QuillState, id: &str) -> TenantContext {
    state.resolver.resolve(&TenantHints {
        tenant_id: Some(id.into()),
        ..Default::default()
    })
}

fn tenant_in(state: &QuillState, id: &str, database: &str) -> TenantContext {
    state.resolver.resolve(&TenantHints {
        tenant_id: Some(id.into()),
        database: Some(database.into()),
        ..Default::default()
    })
}

async fn seed_user(state: &QuillState, tenant: &TenantContext, id: &str, role: Role) -> User {
    let user = User {
        id: id.into(),
        name: id.into(),
        email: format!("{id}@example.com"),
        role,
        approved: true,
        social: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let record = UserRecord {
        user: user.clone(),
        password_hash: "$2b$04$unused".into(),
    };
    let Value::Object(doc) = serde_json::to_value(&record).unwrap() else {
        panic!("user record is not an object");
    };
    state
        .data
        .collection_for(Some(tenant), "users")
        .insert_one(doc)
        .await
        .unwrap();
    user
}

async fn token_for(state: &QuillState, tenant: &str, user: &User) -> String {
    state.tokens.issue(&TenantId::new(tenant), user).await.unwrap()
}

fn get_req(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

fn with_session(builder: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    builder.header(header::COOKIE, format!("auth-token={token}"))
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn quill_errors_keep_status_and_shape() {
    let (_, router) = app(false);
    let res = router.oneshot(get_req("/api/taken").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert!(res.headers().get("x-request-id").is_some());
    let body = json_body(res).await;
    assert_eq!(body["name"], "Conflict");
    assert_eq!(body["code"], 409);
    assert_eq!(body["className"], "conflict");
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn other_errors_become_opaque_general_errors() {
    let (_, router) = app(false);
    let res = router.oneshot(get_req("/api/boom").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(res).await;
    assert_eq!(body["name"], "GeneralError");
    assert_eq!(body["className"], "general-error");
    assert!(!body["message"].as_str().unwrap().contains("hunter2"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (_, router) = app(false);
    let res = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/echo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"title\":"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert!(body["errors"]["_schema"].is_array());
}

#[tokio::test]
async fn provided_request_id_is_echoed() {
    let (_, router) = app(false);
    let provided = HeaderValue::from_static("req-test-123");
    let res = router
        .oneshot(
            get_req("/api/whoami")
                .header("x-request-id", provided.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn tenant_comes_from_host_or_override_headers() {
    let (_, router) = app(false);

    let mapped = router
        .clone()
        .oneshot(get_req("/api/whoami").header(header::HOST, "www.acme.test:4321").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(mapped).await, json!({"tenant": "acme", "database": "acme_db"}));

    let unknown = router
        .clone()
        .oneshot(get_req("/api/whoami").header(header::HOST, "nowhere.test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(unknown).await, json!({"tenant": "default", "database": "coders_website"}));

    let overridden = router
        .oneshot(
            get_req("/api/whoami")
                .header(header::HOST, "acme.test")
                .header("x-tenant-id", "globex")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(json_body(overridden).await, json!({"tenant": "globex", "database": "acme_db"}));
}

#[tokio::test]
async fn admin_routes_require_the_admin_role() {
    let (state, router) = app(false);
    let t1 = tenant(&state, "t1");
    let user = seed_user(&state, &t1, "u1", Role::User).await;
    let admin = seed_user(&state, &t1, "a1", Role::Admin).await;

    let user_token = token_for(&state, "t1", &user).await;
    let res = router
        .clone()
        .oneshot(with_session(get_req("/api/admin/ping").header("x-tenant-id", "t1"), &user_token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(res).await["name"], "Forbidden");

    let admin_token = token_for(&state, "t1", &admin).await;
    let res = router
        .oneshot(with_session(get_req("/api/admin/ping").header("x-tenant-id", "t1"), &admin_token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"pong");
}

#[tokio::test]
async fn sessions_are_rejected_without_a_valid_cookie() {
    let (state, router) = app(false);
    let t1 = tenant(&state, "t1");
    let user = seed_user(&state, &t1, "u1", Role::User).await;

    let res = router
        .clone()
        .oneshot(get_req("/api/me").header("x-tenant-id", "t1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["name"], "NotAuthenticated");

    let res = router
        .clone()
        .oneshot(with_session(get_req("/api/me").header("x-tenant-id", "t1"), "").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token = token_for(&state, "t1", &user).await;
    let res = router
        .oneshot(with_session(get_req("/api/me").header("x-tenant-id", "t1"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"id": "u1"}));
}

#[tokio::test]
async fn a_token_from_one_tenant_does_not_open_another() {
    let (state, router) = app(false);
    let t1 = tenant(&state, "t1");
    let t2 = tenant_in(&state, "t2", "t2_db");
    assert_ne!(t1.database, t2.database);
    let user = seed_user(&state, &t1, "u1", Role::Admin).await;
    // same user id exists in t2's database too
    seed_user(&state, &t2, "u1", Role::Admin).await;

    let token = token_for(&state, "t1", &user).await;
    let on_t2 = |token: &str| {
        with_session(
            get_req("/api/me")
                .header("x-tenant-id", "t2")
                .header("x-site-database", "t2_db"),
            token,
        )
        .body(Body::empty())
        .unwrap()
    };

    let res = router.clone().oneshot(on_t2(&token)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["name"], "NotAuthenticated");

    // the same user with a t2 token gets in, so the rejection is about the tenant
    let t2_token = token_for(&state, "t2", &user).await;
    let res = router.oneshot(on_t2(&t2_token)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn deleted_users_lose_their_session() {
    let (state, router) = app(false);
    let t1 = tenant(&state, "t1");
    let user = seed_user(&state, &t1, "u1", Role::User).await;
    let token = token_for(&state, "t1", &user).await;

    state
        .data
        .collection_for(Some(&t1), "users")
        .delete_one(&Filter::by_id("u1"))
        .await
        .unwrap();

    let res = router
        .oneshot(with_session(get_req("/api/me").header("x-tenant-id", "t1"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn optional_identity_never_rejects() {
    let (state, router) = app(false);
    let t1 = tenant(&state, "t1");
    let user = seed_user(&state, &t1, "u1", Role::User).await;
    let token = token_for(&state, "t1", &user).await;

    let anonymous = router
        .clone()
        .oneshot(with_session(get_req("/api/posts").header("x-tenant-id", "t1"), "garbage").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert_eq!(json_body(anonymous).await, json!({"drafts": false}));

    let signed_in = router
        .oneshot(with_session(get_req("/api/posts").header("x-tenant-id", "t1"), &token).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(json_body(signed_in).await, json!({"drafts": true}));
}

#[tokio::test]
async fn strict_writes_refuse_unidentified_sites() {
    let (state, router) = app(true);
    let post = |host: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/posts")
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    };

    let res = router.clone().oneshot(post("nowhere.test")).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = router.clone().oneshot(post("acme.test")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // reads still fall back
    let res = router
        .oneshot(get_req("/api/whoami").header(header::HOST, "nowhere.test").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let acme = state.resolver.resolve(&TenantHints {
        host: Some("acme.test".into()),
        ..Default::default()
    });
    let stored = state
        .data
        .collection_for(Some(&acme), "posts")
        .find(&Filter::new(), FindOptions::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn cors_mirrors_allowed_origins_only() {
    let (_, router) = app(false);
    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/posts")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let res = router.clone().oneshot(preflight("https://www.acme.test")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://www.acme.test"
    );
    assert_eq!(
        res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(res.headers().get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "300");

    // the test context runs in production mode
    let res = router.oneshot(preflight("https://evil.example")).await.unwrap();
    assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
