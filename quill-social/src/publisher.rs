use async_trait::async_trait;
use quill_auth::user::SocialCredentials;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::platform::Platform;

/// The article being shared.
#[derive(Debug, Clone, Default)]
pub struct PublishContent {
    pub title: String,
    /// Public URL of the article
    pub url: String,
    /// Article summary, used when no custom message is given
    pub body: String,
    /// Per-platform custom text
    pub message: Option<String>,
    pub cover_image: Option<String>,
}

impl PublishContent {
    /// Custom message if set, otherwise the summary.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.body.as_str())
    }
}

/// One entry of a publish request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishRequest {
    pub platform: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Comma-separated subreddits, used when the user has none configured
    #[serde(default)]
    pub subreddit: Option<String>,
    /// Accepted for compatibility; link previews come from the article page.
    #[serde(default, rename = "useImage")]
    pub use_image: bool,
}

/// Outcome of one post on one target (a subreddit, a page).
#[derive(Debug)]
pub struct PublishedItem {
    pub target: Option<String>,
    pub outcome: Result<String, PublishError>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    /// `Err` when nothing could be attempted (credentials, authentication);
    /// otherwise one item per target.
    async fn publish(
        &self,
        credentials: &SocialCredentials,
        content: &PublishContent,
        request: &PublishRequest,
    ) -> Result<Vec<PublishedItem>, PublishError>;
}
