//! In-process record store sharing the transition rules of the Postgres store.
//!
//! Each operation holds the map lock for its whole read-modify-write, which gives
//! the same single-winner guarantee as the serializable transaction, but only
//! within one process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::sync::models::{db_now, BridgeSyncType, SyncRecord};
use crate::sync::repositories::SyncRecordRepository;
use bridge_common::error::{BridgeError, BridgeResult};

#[derive(Default)]
pub struct MemorySyncRecordRepository {
    records: Mutex<HashMap<BridgeSyncType, SyncRecord>>,
    history: Mutex<Vec<SyncRecord>>,
    stale_after: Option<Duration>,
}

impl MemorySyncRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_after(mut self, stale_after: StdDuration) -> Self {
        self.stale_after = Duration::from_std(stale_after).ok();
        self
    }

    /// Replace the stored record, e.g. to simulate an earlier run.
    pub fn seed(&self, record: SyncRecord) {
        self.lock_records().insert(record.sync_type, record);
    }

    pub fn get(&self, sync_type: BridgeSyncType) -> Option<SyncRecord> {
        self.lock_records().get(&sync_type).cloned()
    }

    /// Every stored state of `sync_type`, oldest first.
    pub fn history(&self, sync_type: BridgeSyncType) -> Vec<SyncRecord> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.sync_type == sync_type)
            .cloned()
            .collect()
    }

    fn lock_records(&self) -> MutexGuard<'_, HashMap<BridgeSyncType, SyncRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition<T>(
        &self,
        sync_type: BridgeSyncType,
        apply: impl FnOnce(&mut SyncRecord, DateTime<Utc>) -> BridgeResult<T>,
    ) -> BridgeResult<SyncRecord> {
        let now = db_now();
        let mut records = self.lock_records();
        let stored = records
            .entry(sync_type)
            .or_insert_with(|| SyncRecord::new(sync_type, now));

        // Work on a copy so a rejected transition leaves the stored row untouched.
        let mut record = stored.clone();
        apply(&mut record, now)?;
        *stored = record.clone();

        self.history
            .lock()
            .map_err(|_| BridgeError::Internal("sync history lock poisoned".to_string()))?
            .push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl SyncRecordRepository for MemorySyncRecordRepository {
    async fn get_or_create(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        let now = db_now();
        Ok(self
            .lock_records()
            .entry(sync_type)
            .or_insert_with(|| SyncRecord::new(sync_type, now))
            .clone())
    }

    async fn start(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        let stale_after = self.stale_after;
        self.transition(sync_type, |record, now| record.begin(now, stale_after))
    }

    async fn set_progress(
        &self,
        sync_type: BridgeSyncType,
        count: i32,
        progress: f32,
    ) -> BridgeResult<SyncRecord> {
        self.transition(sync_type, |record, now| {
            record.report_progress(count, progress, now)
        })
    }

    async fn set_error(
        &self,
        sync_type: BridgeSyncType,
        message: &str,
        resume_token: Option<&str>,
    ) -> BridgeResult<SyncRecord> {
        self.transition(sync_type, |record, now| {
            record.fail(message, resume_token, now);
            Ok(())
        })
    }

    async fn set_success(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        self.transition(sync_type, |record, now| record.succeed(now))
    }
}
