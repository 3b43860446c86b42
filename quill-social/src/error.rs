use thiserror::Error;

use crate::platform::Platform;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("{} credentials not configured. Please add them in your profile settings.", .0.label())]
    MissingCredentials(Platform),

    #[error("No subreddits specified")]
    NoTargets,

    #[error("{0}")]
    InvalidContent(String),

    #[error("authentication failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("{name} API error: {message}", name = .platform.label())]
    Api { platform: Platform, message: String },

    #[error("no post URL returned")]
    MissingResult,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
