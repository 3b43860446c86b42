// Reddit: password-grant token, then one submission per subreddit.

use async_trait::async_trait;
use quill_auth::user::{RedditCredentials, SocialCredentials};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::PublishError;
use crate::platform::Platform;
use crate::publisher::{PublishContent, PublishRequest, PublishedItem, Publisher};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com";
pub const REDDIT_API_URL: &str = "https://oauth.reddit.com";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Default)]
struct SubmitData {
    #[serde(default)]
    url: String,
    #[serde(default)]
    id: String,
}

#[derive(Deserialize, Default)]
struct SubmitBody {
    #[serde(default)]
    errors: Vec<Vec<String>>,
    #[serde(default)]
    data: Option<SubmitData>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    json: SubmitBody,
}

/// Subreddit names from a comma-separated list, without `r/` prefixes.
pub fn parse_subreddits(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| {
            let s = s.trim();
            let s = s.strip_prefix("/r/").unwrap_or(s);
            s.strip_prefix("r/").unwrap_or(s).trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Self-post body: the text, a rule, and a link back to the article.
pub fn self_post_text(text: &str, url: &str) -> String {
    format!("{text}\n\n---\n\n**Read the full article:** {url}")
}

#[derive(Clone)]
pub struct RedditPublisher {
    client: reqwest::Client,
    auth_url: String,
    api_url: String,
}

impl RedditPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            auth_url: REDDIT_AUTH_URL.to_string(),
            api_url: REDDIT_API_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.api_url = api_url.into();
        self
    }

    fn user_agent(creds: &RedditCredentials) -> String {
        format!("QuillCMS:v0.1 (by /u/{})", creds.username)
    }

    async fn access_token(&self, creds: &RedditCredentials) -> Result<String, PublishError> {
        let res = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_url))
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .header(reqwest::header::USER_AGENT, Self::user_agent(creds))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PublishError::Auth {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse = res.json().await?;
        debug!("reddit token acquired");
        Ok(token.access_token)
    }

    async fn submit(
        &self,
        token: &str,
        creds: &RedditCredentials,
        subreddit: &str,
        content: &PublishContent,
    ) -> Result<String, PublishError> {
        let mut form = vec![
            ("api_type", "json".to_string()),
            ("sr", subreddit.to_string()),
            ("title", content.title.clone()),
        ];
        if content.cover_image.as_deref().is_some_and(|c| !c.is_empty()) {
            // link posts pick up the article's preview image
            form.push(("kind", "link".to_string()));
            form.push(("url", content.url.clone()));
        } else {
            form.push(("kind", "self".to_string()));
            form.push(("text", self_post_text(content.text(), &content.url)));
        }

        let res: SubmitResponse = self
            .client
            .post(format!("{}/api/submit", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, Self::user_agent(creds))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        if !res.json.errors.is_empty() {
            let message = res
                .json
                .errors
                .iter()
                .filter(|e| e.len() > 1)
                .map(|e| e.join(": "))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PublishError::Api {
                platform: Platform::Reddit,
                message,
            });
        }

        let data = res.json.data.unwrap_or_default();
        if !data.url.is_empty() {
            return Ok(data.url);
        }
        if !data.id.is_empty() {
            return Ok(format!("https://reddit.com/r/{subreddit}/comments/{}", data.id));
        }
        Err(PublishError::MissingResult)
    }
}

#[async_trait]
impl Publisher for RedditPublisher {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn publish(
        &self,
        credentials: &SocialCredentials,
        content: &PublishContent,
        request: &PublishRequest,
    ) -> Result<Vec<PublishedItem>, PublishError> {
        let creds = credentials
            .reddit
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or(PublishError::MissingCredentials(Platform::Reddit))?;

        // the user's configured list wins over the request's
        let list = if creds.subreddits.trim().is_empty() {
            request.subreddit.clone().unwrap_or_default()
        } else {
            creds.subreddits.clone()
        };
        let subreddits = parse_subreddits(&list);
        if subreddits.is_empty() {
            return Err(PublishError::NoTargets);
        }

        let token = self.access_token(creds).await?;

        let mut items = Vec::with_capacity(subreddits.len());
        for subreddit in subreddits {
            let outcome = self.submit(&token, creds, &subreddit, content).await;
            if outcome.is_ok() {
                info!(%subreddit, "posted to reddit");
            }
            items.push(PublishedItem {
                target: Some(subreddit),
                outcome,
            });
        }
        Ok(items)
    }
}
