// Session cookie helpers.

use axum::http::{header, HeaderMap, HeaderValue};
use quill_auth::options::AuthOptions;
use quill_core::errors::QuillError;

fn attributes(options: &AuthOptions) -> &'static str {
    if options.secure_cookie {
        "; Path=/; HttpOnly; SameSite=Lax; Secure"
    } else {
        "; Path=/; HttpOnly; SameSite=Lax"
    }
}

fn header_value(raw: String) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(&raw).map_err(|e| {
        QuillError::general_error("Failed to build session cookie")
            .with_source(e.into())
            .into_anyhow()
    })
}

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(options: &AuthOptions, token: &str) -> anyhow::Result<HeaderValue> {
    header_value(format!(
        "{}={}{}; Max-Age={}",
        options.cookie_name,
        token,
        attributes(options),
        options.cookie_max_age()
    ))
}

/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_session_cookie(options: &AuthOptions) -> anyhow::Result<HeaderValue> {
    header_value(format!(
        "{}={}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        options.cookie_name,
        attributes(options)
    ))
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
}
