//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Errors surfaced by handlers, rendered as `{"detail": "..."}`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Rejected input
    #[error("{0}")]
    BadRequest(String),

    /// Reddit could not be reached or answered unexpectedly
    #[error("Error fetching Reddit posts: {0}")]
    RedditFetch(civitas_core::Error),

    /// Classifier, store or other internal failure
    #[error(transparent)]
    Internal(#[from] civitas_core::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RedditFetch(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", detail);
            metrics::counter!("civitas_errors_total", "stage" => "http").increment(1);
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
