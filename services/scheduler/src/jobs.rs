use std::sync::Arc;
use std::time::Duration;

use bridge_common::error::BridgeError;
use bridge_db::sync::models::{BridgeSyncType, SyncStatus};
use bridge_engine::SyncRunner;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The run finished; the status is what got recorded.
    Finished(SyncStatus),
    /// Another run holds the record.
    Skipped,
    /// The record itself could not be read or written.
    Failed,
}

/// One scheduled attempt of `sync_type`.
pub async fn tick(runner: &dyn SyncRunner, sync_type: BridgeSyncType) -> TickOutcome {
    match runner.run_once(sync_type).await {
        Ok(snapshot) => {
            tracing::info!(
                sync_type = %sync_type,
                status = %snapshot.status,
                count = snapshot.count,
                "scheduled sync finished"
            );
            TickOutcome::Finished(snapshot.status)
        }
        Err(BridgeError::SyncConflict(_)) => {
            tracing::info!(sync_type = %sync_type, "sync already running, skipping tick");
            TickOutcome::Skipped
        }
        Err(e) => {
            tracing::error!(sync_type = %sync_type, error = %e, "scheduled sync failed");
            TickOutcome::Failed
        }
    }
}

/// Runs `sync_type` every `period` until `shutdown` flips or its sender is
/// dropped. The first run starts immediately.
pub async fn run_job(
    runner: Arc<dyn SyncRunner>,
    sync_type: BridgeSyncType,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(sync_type = %sync_type, period_secs = period.as_secs(), "job scheduled");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(runner.as_ref(), sync_type).await;
            }
            _ = shutdown.changed() => {
                tracing::info!(sync_type = %sync_type, "job stopping");
                break;
            }
        }
    }
}
