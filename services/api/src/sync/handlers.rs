use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bridge_db::sync::models::SyncRecordSnapshot;

use crate::error::ApiError;
use crate::extractors::SyncTypeParam;
use crate::AppState;

pub async fn get_sync_status(
    State(state): State<AppState>,
    SyncTypeParam(sync_type): SyncTypeParam,
) -> Result<Json<SyncRecordSnapshot>, ApiError> {
    let snapshot = state.runner.status(sync_type).await?;
    Ok(Json(snapshot))
}

/// Claims the record before answering so a conflict surfaces as 409; the run
/// itself continues in the background.
pub async fn start_sync(
    State(state): State<AppState>,
    SyncTypeParam(sync_type): SyncTypeParam,
) -> Result<(StatusCode, Json<SyncRecordSnapshot>), ApiError> {
    let record = state.runner.start(sync_type).await?;
    let snapshot = record.snapshot();

    let runner = state.runner.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.run_started(record).await {
            tracing::error!(sync_type = %sync_type, error = %e, "failed to record sync outcome");
        }
    });

    tracing::info!(sync_type = %sync_type, "sync started via api");
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}
