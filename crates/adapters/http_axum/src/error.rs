//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use spokes_domain::error::BridgeError;

/// `{status: "ERROR", reason}` body shared by every endpoint.
#[derive(Serialize)]
pub struct ErrorBody {
    status: &'static str,
    reason: String,
}

impl ErrorBody {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status: "ERROR",
            reason: reason.into(),
        }
    }
}

/// Maps [`BridgeError`] to an HTTP response.
///
/// Both peers treat `status` as the outcome, so most failures are sent
/// with HTTP 200.
pub struct ApiError(BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match &self.0 {
            BridgeError::UnknownBridge(name) => {
                tracing::debug!(bridge = %name, "request for unknown bridge");
                (StatusCode::OK, "No such bridge".to_string())
            }
            BridgeError::Unauthorized => (StatusCode::OK, "Unauthorized".to_string()),
            BridgeError::NotFound(err) => (StatusCode::OK, err.to_string()),
            BridgeError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
        };

        (status, Json(ErrorBody::new(reason))).into_response()
    }
}
