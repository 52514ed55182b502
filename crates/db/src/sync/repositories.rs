use async_trait::async_trait;

use crate::sync::models::{BridgeSyncType, SyncRecord};
use bridge_common::error::BridgeResult;

/// Transactional state machine over the per-type sync record.
///
/// Every method runs as one serializable unit against the row keyed by
/// `sync_type`, so concurrent callers (possibly in different processes) never
/// both observe a startable record.
#[async_trait]
pub trait SyncRecordRepository: Send + Sync {
    /// Return the record for `sync_type`, creating a NOT_SYNCED one if missing.
    async fn get_or_create(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord>;

    /// Move to RUNNING. Fails with `SyncConflict` if another run holds the record.
    async fn start(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord>;

    /// Update count/progress. Fails with `InvalidStateTransition` unless RUNNING.
    async fn set_progress(
        &self,
        sync_type: BridgeSyncType,
        count: i32,
        progress: f32,
    ) -> BridgeResult<SyncRecord>;

    /// Move to ERROR from any state, storing a truncated message and resume token.
    async fn set_error(
        &self,
        sync_type: BridgeSyncType,
        message: &str,
        resume_token: Option<&str>,
    ) -> BridgeResult<SyncRecord>;

    /// Move to SUCCESS. Fails with `InvalidStateTransition` unless RUNNING.
    async fn set_success(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord>;
}
