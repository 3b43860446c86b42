use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const CATEGORIES_COLLECTION: &str = "categories";
pub const DEFAULT_KIND: &str = "blog";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[serde(default)]
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct CategoryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub slug: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Lowercase, spaces to hyphens, anything outside `[a-z0-9-]` dropped.
pub fn category_slug(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert_eq!(category_slug("Web Development"), "web-development");
        assert_eq!(category_slug("C++ & Rust!"), "c--rust");
        assert_eq!(category_slug("General"), "general");
    }
}
