//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use smoorgh_core::Error;

/// A failed request; always reported as 500 with `{"error": ...}`
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
