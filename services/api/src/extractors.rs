use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bridge_db::sync::models::BridgeSyncType;

/// Sync type taken from the `{sync_type}` path segment.
pub struct SyncTypeParam(pub BridgeSyncType);

#[derive(Debug)]
pub struct SyncTypeRejection(String);

impl IntoResponse for SyncTypeRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0 });
        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SyncTypeParam {
    type Rejection = SyncTypeRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| SyncTypeRejection(e.body_text()))?;

        raw.parse::<BridgeSyncType>()
            .map(SyncTypeParam)
            .map_err(SyncTypeRejection)
    }
}
