use axum::{extract::Request, middleware::Next, response::Response};
use quill_auth::user::Identity;
use quill_core::errors::QuillError;

use crate::error::QuillAxumError;

/// Admin-only route groups. Must run inside [`super::session::require_session`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, QuillAxumError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or_else(|| QuillError::not_authenticated("Authentication required"))?;
    quill_auth::gate::require_admin(identity)?;
    Ok(next.run(req).await)
}
