use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Form;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use quill_auth::user::{FacebookCredentials, RedditCredentials, SocialCredentials};
use quill_social::{
    FacebookPublisher, PublishContent, PublishRequest, PublishStatus, PublisherSet, RedditPublisher,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn fake_reddit() -> String {
    let router = Router::new()
        .route(
            "/api/v1/access_token",
            post(|headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                let basic = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("");
                if !basic.starts_with("Basic ") || form.get("password").map(String::as_str) != Some("pw") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_grant"})));
                }
                (StatusCode::OK, Json(json!({"access_token": "tok", "expires_in": 3600})))
            }),
        )
        .route(
            "/api/submit",
            post(|headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer tok");
                let sr = form.get("sr").cloned().unwrap_or_default();
                if sr == "private" {
                    return Json(json!({"json": {"errors": [["SUBREDDIT_NOTALLOWED", "you aren't allowed to post there", "sr"]]}}));
                }
                let kind = form.get("kind").cloned().unwrap_or_default();
                if kind == "self" {
                    assert!(form["text"].contains("**Read the full article:** https://blog.test/blog/hello"));
                    return Json(json!({"json": {"errors": [], "data": {"id": "abc123"}}}));
                }
                assert_eq!(form["url"], "https://blog.test/blog/hello");
                Json(json!({"json": {"errors": [], "data": {"url": format!("https://reddit.com/r/{sr}/comments/xyz/hello"), "id": "xyz"}}}))
            }),
        );
    serve(router).await
}

async fn fake_graph() -> String {
    let router = Router::new().route(
        "/me/feed",
        post(|Form(form): Form<HashMap<String, String>>| async move {
            if form.get("access_token").map(String::as_str) != Some("page-token") {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"message": "Invalid OAuth access token.", "type": "OAuthException", "code": 190}})),
                );
            }
            assert_eq!(form["message"], "Hello\n\nShared from the blog");
            (StatusCode::OK, Json(json!({"id": "42_777"})))
        }),
    );
    serve(router).await
}

fn content(cover_image: Option<&str>) -> PublishContent {
    PublishContent {
        title: "Hello".into(),
        url: "https://blog.test/blog/hello".into(),
        body: "A short summary".into(),
        message: None,
        cover_image: cover_image.map(str::to_string),
    }
}

fn reddit_creds(subreddits: &str, password: &str) -> SocialCredentials {
    SocialCredentials {
        reddit: Some(RedditCredentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            username: "bot".into(),
            password: password.into(),
            subreddits: subreddits.into(),
        }),
        ..Default::default()
    }
}

fn request(platform: &str) -> PublishRequest {
    PublishRequest {
        platform: platform.into(),
        ..Default::default()
    }
}

async fn set() -> PublisherSet {
    let reddit = fake_reddit().await;
    let graph = fake_graph().await;
    let client = reqwest::Client::new();
    PublisherSet::new()
        .with(Arc::new(
            RedditPublisher::new(client.clone()).with_endpoints(reddit.clone(), reddit),
        ))
        .with(Arc::new(FacebookPublisher::new(client).with_graph_url(graph)))
}

#[tokio::test]
async fn reddit_posts_once_per_subreddit() {
    let set = set().await;
    let results = set
        .publish(&[request("reddit")], &reddit_creds("r/rust, private", "pw"), &content(Some("/uploads/a/cover.png")))
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, PublishStatus::Success);
    assert_eq!(results[0].subreddit.as_deref(), Some("rust"));
    assert_eq!(results[0].message, "Posted to r/rust");
    assert_eq!(results[0].url.as_deref(), Some("https://reddit.com/r/rust/comments/xyz/hello"));

    assert_eq!(results[1].status, PublishStatus::Error);
    assert_eq!(results[1].subreddit.as_deref(), Some("private"));
    assert!(results[1].message.starts_with("Failed to post to r/private: Reddit API error:"));
    assert!(results[1].message.contains("SUBREDDIT_NOTALLOWED"));
}

#[tokio::test]
async fn reddit_self_posts_fall_back_to_an_id_url() {
    let set = set().await;
    let results = set
        .publish(&[request("reddit")], &reddit_creds("webdev", "pw"), &content(None))
        .await;
    assert_eq!(results[0].status, PublishStatus::Success);
    assert_eq!(results[0].url.as_deref(), Some("https://reddit.com/r/webdev/comments/abc123"));
}

#[tokio::test]
async fn request_subreddits_are_used_when_none_are_configured() {
    let set = set().await;
    let mut req = request("reddit");
    req.subreddit = Some("/r/golang".into());
    let results = set.publish(&[req], &reddit_creds("", "pw"), &content(None)).await;
    assert_eq!(results[0].subreddit.as_deref(), Some("golang"));

    let results = set.publish(&[request("reddit")], &reddit_creds("", "pw"), &content(None)).await;
    assert_eq!(results[0].status, PublishStatus::Error);
    assert_eq!(results[0].message, "No subreddits specified");
}

#[tokio::test]
async fn reddit_auth_failure_is_one_error() {
    let set = set().await;
    let results = set
        .publish(&[request("reddit")], &reddit_creds("rust,webdev", "wrong"), &content(None))
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, PublishStatus::Error);
    assert!(results[0].message.contains("401"));
}

#[tokio::test]
async fn facebook_posts_to_the_page() {
    let set = set().await;
    let creds = SocialCredentials {
        facebook: Some(FacebookCredentials {
            page_id: "42".into(),
            page_access_token: "page-token".into(),
        }),
        ..Default::default()
    };
    let mut req = request("facebook");
    req.message = Some("Shared from the blog".into());

    let results = set.publish(&[req.clone()], &creds, &content(None)).await;
    assert_eq!(results[0].status, PublishStatus::Success);
    assert_eq!(results[0].message, "Posted to Facebook Page");
    assert_eq!(results[0].url.as_deref(), Some("https://www.facebook.com/42/posts/777"));
    assert!(results[0].subreddit.is_none());

    let bad = SocialCredentials {
        facebook: Some(FacebookCredentials {
            page_id: "42".into(),
            page_access_token: "expired".into(),
        }),
        ..Default::default()
    };
    let results = set.publish(&[req], &bad, &content(None)).await;
    assert_eq!(results[0].status, PublishStatus::Error);
    assert_eq!(
        results[0].message,
        "Failed to post to Facebook: Facebook API error: Invalid OAuth access token."
    );
}

#[tokio::test]
async fn missing_credentials_and_unsupported_platforms() {
    let set = set().await;
    let results = set
        .publish(
            &[request("facebook"), request("twitter"), request("mastodon")],
            &SocialCredentials::default(),
            &content(None),
        )
        .await;

    assert_eq!(results[0].status, PublishStatus::Error);
    assert_eq!(
        results[0].message,
        "Facebook credentials not configured. Please add them in your profile settings."
    );
    assert_eq!(results[1].status, PublishStatus::Pending);
    assert_eq!(results[1].message, "Platform twitter not yet implemented");
    assert_eq!(results[2].status, PublishStatus::Pending);

    let json: Value = serde_json::to_value(&results[1]).unwrap();
    assert_eq!(json, json!({"platform": "twitter", "status": "pending", "message": "Platform twitter not yet implemented"}));
}
