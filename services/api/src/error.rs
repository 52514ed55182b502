use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bridge_common::error::BridgeError;

pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            BridgeError::SyncConflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            BridgeError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            BridgeError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
