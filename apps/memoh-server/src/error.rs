//! Maps `memoh_core::CoreError` onto HTTP status codes (§7 / §6 HTTP
//! surface), the way the teacher's route handlers map `anyhow::Error`
//! strings onto `StatusCode` — except typed, since `memoh-core` returns a
//! real error enum instead of `anyhow::Error`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memoh_core::CoreError;
use serde_json::json;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::PatchMismatch(_) => StatusCode::BAD_REQUEST,
            CoreError::TaskStopTimeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
