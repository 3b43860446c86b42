use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quill_core::errors::QuillError;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct QuillAxumError(pub anyhow::Error);

pub type QuillAxumResult<T> = Result<T, QuillAxumError>;

impl From<anyhow::Error> for QuillAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<QuillError> for QuillAxumError {
    fn from(e: QuillError) -> Self {
        Self(e.into_anyhow())
    }
}

fn render(err: &QuillError) -> Response {
    let safe = err.sanitize_for_client();
    let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(safe.to_json())).into_response()
}

impl IntoResponse for QuillAxumError {
    fn into_response(self) -> Response {
        // A QuillError anywhere in the chain keeps its status and fields.
        if let Some(quill) = QuillError::find_in(&self.0) {
            if quill.code() >= 500 {
                error!(error = ?self.0, "request failed");
            }
            return render(quill);
        }

        error!(error = ?self.0, "unhandled error");
        render(&QuillError::general_error("Internal server error"))
    }
}

pub fn map_json_rejection(rejection: JsonRejection) -> QuillAxumError {
    QuillError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}
