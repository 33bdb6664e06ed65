use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nd_core::Error;
use serde_json::json;

/// Error returned by the non-stage routes, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            err if err.is_validation() => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            // stage failures keep their generic "Step N failed"
            Error::StepFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
        };
        if status.is_server_error() {
            match &self.0 {
                Error::StepFailed { name, source, .. } => tracing::error!("{}: {} ({})", self.0, name, source),
                err => tracing::error!("Request failed: {}", err),
            }
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
