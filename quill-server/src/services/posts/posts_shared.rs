use chrono::{DateTime, Utc};
use quill_auth::user::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::categories::Category;

pub const POSTS_COLLECTION: &str = "posts";
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "coverImage", default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(rename = "readingTime", default)]
    pub reading_time: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(rename = "parentDoc", default, skip_serializing_if = "Option::is_none")]
    pub parent_doc: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// A post with its author and category looked up.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_data: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_data: Option<Category>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewPost {
    #[serde(default)]
    #[validate(length(min = 1, message = "is required"))]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "coverImage", default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(rename = "parentDoc", default)]
    pub parent_doc: Option<String>,
    #[serde(default)]
    pub published: bool,
}

/// Fields a post update may set. Absent fields are left alone.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "coverImage", default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(rename = "parentDoc", default, skip_serializing_if = "Option::is_none")]
    pub parent_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

/// URL slug for a post title. Falls back to `post-<timestamp>` when the
/// title has no usable characters.
pub fn post_slug(title: &str, now: DateTime<Utc>) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    let slug = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        format!("post-{}", now.format("%Y%m%d%H%M%S"))
    } else {
        slug
    }
}

/// Minutes to read `content`, rounded up.
pub fn reading_time(content: &str) -> usize {
    content.split_whitespace().count().div_ceil(WORDS_PER_MINUTE)
}
