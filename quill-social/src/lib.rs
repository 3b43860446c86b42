//! quill-social: share published articles on social platforms.
//!
//! A [`PublisherSet`] fans a list of [`PublishRequest`]s out to the
//! registered [`Publisher`]s and reports one [`PlatformResult`] per post.
//! Reddit posts once per subreddit; Facebook posts to the page behind the
//! page access token. Other platforms are reported as pending.

pub mod error;
pub mod facebook;
pub mod platform;
pub mod publisher;
pub mod reddit;
pub mod set;

pub use error::PublishError;
pub use facebook::FacebookPublisher;
pub use platform::Platform;
pub use publisher::{PublishContent, PublishRequest, PublishedItem, Publisher};
pub use reddit::RedditPublisher;
pub use set::{PlatformResult, PublishStatus, PublisherSet};
