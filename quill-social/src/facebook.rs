// Facebook page posts through the Graph API.

use async_trait::async_trait;
use quill_auth::user::{FacebookCredentials, SocialCredentials};
use serde::Deserialize;
use tracing::info;

use crate::error::PublishError;
use crate::platform::Platform;
use crate::publisher::{PublishContent, PublishRequest, PublishedItem, Publisher};

pub const GRAPH_URL: &str = "https://graph.facebook.com/v18.0";

#[derive(Deserialize, Default)]
struct GraphError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct FeedResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    error: Option<GraphError>,
}

/// Title, then a blank line and the custom message or summary when present.
pub fn page_message(content: &PublishContent) -> String {
    let text = content.text().trim();
    if text.is_empty() {
        content.title.clone()
    } else {
        format!("{}\n\n{}", content.title, text)
    }
}

/// Public URL of a Graph `pageid_postid` id.
pub fn post_url(page_id: &str, graph_id: &str) -> String {
    match graph_id.split_once('_') {
        Some((_, post)) if !post.is_empty() && !post.contains('_') => {
            format!("https://www.facebook.com/{page_id}/posts/{post}")
        }
        _ => format!("https://www.facebook.com/{page_id}"),
    }
}

#[derive(Clone)]
pub struct FacebookPublisher {
    client: reqwest::Client,
    graph_url: String,
}

impl FacebookPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            graph_url: GRAPH_URL.to_string(),
        }
    }

    pub fn with_graph_url(mut self, url: impl Into<String>) -> Self {
        self.graph_url = url.into();
        self
    }

    async fn post_to_page(
        &self,
        creds: &FacebookCredentials,
        message: &str,
        link: &str,
    ) -> Result<String, PublishError> {
        // "me" resolves to the page for page access tokens
        let res: FeedResponse = self
            .client
            .post(format!("{}/me/feed", self.graph_url))
            .form(&[
                ("message", message),
                ("link", link),
                ("access_token", creds.page_access_token.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = res.error.filter(|e| !e.message.is_empty()) {
            return Err(PublishError::Api {
                platform: Platform::Facebook,
                message: err.message,
            });
        }
        if res.id.is_empty() {
            return Err(PublishError::MissingResult);
        }
        info!(page = %creds.page_id, "posted to facebook");
        Ok(post_url(&creds.page_id, &res.id))
    }
}

#[async_trait]
impl Publisher for FacebookPublisher {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(
        &self,
        credentials: &SocialCredentials,
        content: &PublishContent,
        _request: &PublishRequest,
    ) -> Result<Vec<PublishedItem>, PublishError> {
        let creds = credentials
            .facebook
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or(PublishError::MissingCredentials(Platform::Facebook))?;

        let message = page_message(content);
        if message.trim().is_empty() {
            return Err(PublishError::InvalidContent("Message is empty".into()));
        }

        let outcome = self.post_to_page(creds, &message, &content.url).await;

        Ok(vec![PublishedItem {
            target: None,
            outcome,
        }])
    }
}
