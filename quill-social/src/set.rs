use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quill_auth::user::SocialCredentials;
use serde::Serialize;
use tracing::warn;

use crate::error::PublishError;
use crate::facebook::FacebookPublisher;
use crate::platform::Platform;
use crate::publisher::{PublishContent, PublishRequest, Publisher};
use crate::reddit::RedditPublisher;

pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Success,
    Error,
    Pending,
}

/// One line of a publish report.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformResult {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
    pub status: PublishStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PlatformResult {
    fn new(platform: &str, status: PublishStatus, message: impl Into<String>) -> Self {
        Self {
            platform: platform.to_string(),
            subreddit: None,
            status,
            message: message.into(),
            url: None,
        }
    }
}

fn success_message(platform: Platform, target: Option<&str>) -> String {
    match (platform, target) {
        (Platform::Reddit, Some(sr)) => format!("Posted to r/{sr}"),
        (Platform::Facebook, _) => "Posted to Facebook Page".to_string(),
        (p, _) => format!("Posted to {}", p.label()),
    }
}

fn failure_message(platform: Platform, target: Option<&str>, err: &PublishError) -> String {
    match (platform, target) {
        (Platform::Reddit, Some(sr)) => format!("Failed to post to r/{sr}: {err}"),
        (p, _) => format!("Failed to post to {}: {err}", p.label()),
    }
}

/// Publishers by platform. Platforms without one report `pending`.
#[derive(Default, Clone)]
pub struct PublisherSet {
    publishers: HashMap<Platform, Arc<dyn Publisher>>,
}

impl PublisherSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reddit and Facebook against their public endpoints.
    pub fn standard() -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(PUBLISH_TIMEOUT).build()?;
        Ok(Self::new()
            .with(Arc::new(RedditPublisher::new(client.clone())))
            .with(Arc::new(FacebookPublisher::new(client))))
    }

    pub fn with(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.insert(publisher.platform(), publisher);
        self
    }

    pub fn supports(&self, platform: Platform) -> bool {
        self.publishers.contains_key(&platform)
    }

    pub async fn publish(
        &self,
        requests: &[PublishRequest],
        credentials: &SocialCredentials,
        content: &PublishContent,
    ) -> Vec<PlatformResult> {
        let mut results = Vec::new();

        for request in requests {
            let name = request.platform.trim();
            let publisher = name
                .parse::<Platform>()
                .ok()
                .and_then(|p| self.publishers.get(&p));
            let Some(publisher) = publisher else {
                results.push(PlatformResult::new(
                    name,
                    PublishStatus::Pending,
                    format!("Platform {name} not yet implemented"),
                ));
                continue;
            };

            let platform = publisher.platform();
            let content = PublishContent {
                message: request.message.clone(),
                ..content.clone()
            };

            match publisher.publish(credentials, &content, request).await {
                Ok(items) => {
                    for item in items {
                        let target = item.target.as_deref();
                        let mut result = match &item.outcome {
                            Ok(url) => {
                                let mut r = PlatformResult::new(
                                    platform.as_str(),
                                    PublishStatus::Success,
                                    success_message(platform, target),
                                );
                                r.url = Some(url.clone());
                                r
                            }
                            Err(err) => {
                                warn!(%platform, to = ?target, error = %err, "publish failed");
                                PlatformResult::new(
                                    platform.as_str(),
                                    PublishStatus::Error,
                                    failure_message(platform, target, err),
                                )
                            }
                        };
                        result.subreddit = item.target.filter(|_| platform == Platform::Reddit);
                        results.push(result);
                    }
                }
                Err(err) => {
                    warn!(%platform, error = %err, "publish not attempted");
                    results.push(PlatformResult::new(
                        platform.as_str(),
                        PublishStatus::Error,
                        err.to_string(),
                    ));
                }
            }
        }

        results
    }
}
