use std::str::FromStr;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};

use crate::sync::models::{
    db_now, sync_epoch, BridgeSyncType, StartMode, SyncRecord, SyncStatus,
};
use crate::sync::repositories::SyncRecordRepository;
use bridge_common::error::{BridgeError, BridgeResult};

const SERIALIZATION_RETRIES: u32 = 3;

const SELECT_FOR_UPDATE: &str = "select sync_type, status, from_time, started_at, finished_at, item_count, progress, error_details, error_save, updated_at
     from sync_records where sync_type = $1 for update";

enum TxError {
    /// Postgres aborted the transaction because a concurrent one touched the row.
    Serialization,
    Failed(BridgeError),
}

impl From<BridgeError> for TxError {
    fn from(err: BridgeError) -> Self {
        Self::Failed(err)
    }
}

fn db_error(err: sqlx::Error) -> TxError {
    if is_serialization_failure(&err) {
        TxError::Serialization
    } else {
        TxError::Failed(BridgeError::Database(err.to_string()))
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "40001" || code == "40P01")
}

#[derive(Clone)]
pub struct PgSyncRecordRepository {
    pool: PgPool,
    stale_after: Option<Duration>,
}

impl PgSyncRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            stale_after: None,
        }
    }

    /// Allow `start` to take over a RUNNING record that has not reported for `stale_after`.
    pub fn with_stale_after(mut self, stale_after: StdDuration) -> Self {
        self.stale_after = Duration::from_std(stale_after).ok();
        self
    }

    fn map_row(row: PgRow) -> BridgeResult<SyncRecord> {
        let sync_type_raw: String = row.get("sync_type");
        let status_raw: String = row.get("status");

        Ok(SyncRecord {
            sync_type: BridgeSyncType::from_str(&sync_type_raw).map_err(BridgeError::Internal)?,
            status: SyncStatus::from_str(&status_raw).map_err(BridgeError::Internal)?,
            from_time: row.get("from_time"),
            started_at: row.get("started_at"),
            finished_at: row.get("finished_at"),
            count: row.get("item_count"),
            progress: row.get("progress"),
            error_details: row.get("error_details"),
            error_save: row.get("error_save"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn load_for_update(
        tx: &mut Transaction<'_, Postgres>,
        sync_type: BridgeSyncType,
    ) -> Result<SyncRecord, TxError> {
        sqlx::query(
            "insert into sync_records (sync_type, status, from_time, updated_at)
             values ($1, $2, $3, $4)
             on conflict (sync_type) do nothing",
        )
        .bind(sync_type.as_str())
        .bind(SyncStatus::NotSynced.as_str())
        .bind(sync_epoch())
        .bind(db_now())
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

        let row = sqlx::query(SELECT_FOR_UPDATE)
            .bind(sync_type.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(db_error)?;

        Ok(Self::map_row(row)?)
    }

    async fn save(
        tx: &mut Transaction<'_, Postgres>,
        record: &SyncRecord,
    ) -> Result<(), TxError> {
        sqlx::query(
            "update sync_records
             set status = $2, from_time = $3, started_at = $4, finished_at = $5, item_count = $6,
                 progress = $7, error_details = $8, error_save = $9, updated_at = $10
             where sync_type = $1",
        )
        .bind(record.sync_type.as_str())
        .bind(record.status.as_str())
        .bind(record.from_time)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.count)
        .bind(record.progress)
        .bind(&record.error_details)
        .bind(&record.error_save)
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    /// Load, mutate and store the record inside one serializable transaction.
    /// A failing `apply` drops the transaction, rolling it back.
    async fn transition<T, F>(
        &self,
        sync_type: BridgeSyncType,
        apply: &F,
    ) -> Result<(SyncRecord, T), TxError>
    where
        F: Fn(&mut SyncRecord, DateTime<Utc>) -> BridgeResult<T> + Sync,
    {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("set transaction isolation level serializable")
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let mut record = Self::load_for_update(&mut tx, sync_type).await?;
        let before = record.clone();
        let outcome = apply(&mut record, db_now())?;

        if record != before {
            Self::save(&mut tx, &record).await?;
        }
        tx.commit().await.map_err(db_error)?;

        Ok((record, outcome))
    }

    async fn retrying_transition<T, F>(
        &self,
        sync_type: BridgeSyncType,
        apply: F,
    ) -> BridgeResult<(SyncRecord, T)>
    where
        F: Fn(&mut SyncRecord, DateTime<Utc>) -> BridgeResult<T> + Send + Sync,
    {
        for attempt in 1..=SERIALIZATION_RETRIES {
            match self.transition(sync_type, &apply).await {
                Ok(result) => return Ok(result),
                Err(TxError::Failed(e)) => return Err(e),
                Err(TxError::Serialization) => {
                    tracing::debug!(%sync_type, attempt, "serialization failure, retrying");
                }
            }
        }

        Err(BridgeError::Database(format!(
            "sync record {sync_type} kept failing serialization after {SERIALIZATION_RETRIES} attempts"
        )))
    }
}

#[async_trait]
impl SyncRecordRepository for PgSyncRecordRepository {
    async fn get_or_create(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        let (record, ()) = self.retrying_transition(sync_type, |_, _| Ok(())).await?;
        Ok(record)
    }

    async fn start(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        let stale_after = self.stale_after;
        let begin = |record: &mut SyncRecord, now: DateTime<Utc>| record.begin(now, stale_after);

        // Losing a serialization race means another instance just started this type.
        let (record, mode) = match self.transition(sync_type, &begin).await {
            Ok(result) => result,
            Err(TxError::Serialization) => {
                return Err(BridgeError::SyncConflict(sync_type.to_string()));
            }
            Err(TxError::Failed(e)) => return Err(e),
        };

        match mode {
            StartMode::Fresh => tracing::debug!(
                %sync_type,
                from_time = %record.from_time,
                "sync started"
            ),
            StartMode::Resumed => tracing::info!(
                %sync_type,
                from_time = %record.from_time,
                resume = record.error_save.is_some(),
                "sync resumed after error"
            ),
            StartMode::Reclaimed => tracing::warn!(
                %sync_type,
                from_time = %record.from_time,
                "reclaimed stale running sync"
            ),
        }

        Ok(record)
    }

    async fn set_progress(
        &self,
        sync_type: BridgeSyncType,
        count: i32,
        progress: f32,
    ) -> BridgeResult<SyncRecord> {
        tracing::debug!(%sync_type, count, progress, "update sync progress");
        let (record, ()) = self
            .retrying_transition(sync_type, |record, now| {
                record.report_progress(count, progress, now)
            })
            .await?;
        Ok(record)
    }

    async fn set_error(
        &self,
        sync_type: BridgeSyncType,
        message: &str,
        resume_token: Option<&str>,
    ) -> BridgeResult<SyncRecord> {
        tracing::debug!(%sync_type, error = message, "set sync to ERROR");
        let (record, ()) = self
            .retrying_transition(sync_type, |record, now| {
                record.fail(message, resume_token, now);
                Ok(())
            })
            .await?;
        Ok(record)
    }

    async fn set_success(&self, sync_type: BridgeSyncType) -> BridgeResult<SyncRecord> {
        tracing::debug!(%sync_type, "set sync to SUCCESS");
        let (record, ()) = self
            .retrying_transition(sync_type, |record, now| record.succeed(now))
            .await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    async fn test_repo(sync_type: BridgeSyncType) -> Option<PgSyncRecordRepository> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.expect("db should connect");

        sqlx::query(
            "create table if not exists sync_records (
               sync_type text primary key,
               status text not null default 'NOT_SYNCED',
               from_time timestamptz not null,
               started_at timestamptz,
               finished_at timestamptz,
               item_count integer not null default 0,
               progress real not null default 0,
               error_details varchar(255),
               error_save text,
               updated_at timestamptz not null default now()
             )",
        )
        .execute(&pool)
        .await
        .ok()?;

        // Each test owns one sync type so they can run in parallel.
        sqlx::query("delete from sync_records where sync_type = $1")
            .bind(sync_type.as_str())
            .execute(&pool)
            .await
            .ok()?;

        Some(PgSyncRecordRepository::new(pool))
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let sync_type = BridgeSyncType::ChangelogImportAddress;
        let Some(repo) = test_repo(sync_type).await else {
            return;
        };

        let first = repo.get_or_create(sync_type).await.expect("create");
        let second = repo.get_or_create(sync_type).await.expect("read");

        assert_eq!(first.status, SyncStatus::NotSynced);
        assert_eq!(first.from_time, sync_epoch());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn second_start_conflicts() {
        let sync_type = BridgeSyncType::ChangelogImportSite;
        let Some(repo) = test_repo(sync_type).await else {
            return;
        };

        repo.start(sync_type).await.expect("first start");
        let err = repo.start(sync_type).await.unwrap_err();
        assert!(err.is_conflict(), "got: {err}");
    }

    #[tokio::test]
    async fn full_lifecycle_advances_window() {
        let sync_type = BridgeSyncType::ChangelogImportLegalEntity;
        let Some(repo) = test_repo(sync_type).await else {
            return;
        };

        let first = repo.start(sync_type).await.expect("start");
        repo.set_progress(sync_type, 5, 0.5).await.expect("progress");
        let done = repo.set_success(sync_type).await.expect("success");
        assert_eq!(done.status, SyncStatus::Success);
        assert_eq!(done.progress, 1.0);

        let second = repo.start(sync_type).await.expect("restart");
        assert_eq!(Some(second.from_time), first.started_at);

        repo.set_error(sync_type, "gate unavailable", Some("token"))
            .await
            .expect("error");
        let resumed = repo.start(sync_type).await.expect("resume");
        assert_eq!(resumed.from_time, second.from_time);
        assert_eq!(resumed.error_save.as_deref(), Some("token"));

        repo.set_success(sync_type).await.expect("finish");
        let err = repo.set_progress(sync_type, 1, 0.1).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn concurrent_starts_admit_exactly_one() {
        let sync_type = BridgeSyncType::ChangelogImport;
        let Some(repo) = test_repo(sync_type).await else {
            return;
        };
        repo.get_or_create(sync_type).await.expect("create");

        let (a, b) = tokio::join!(repo.start(sync_type), repo.start(sync_type));
        let started = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_conflict()))
            .count();

        assert_eq!(started, 1);
        assert_eq!(conflicts, 1);
    }

    #[tokio::test]
    async fn error_details_are_truncated() {
        let sync_type = BridgeSyncType::SaasImport;
        let Some(repo) = test_repo(sync_type).await else {
            return;
        };

        let record = repo
            .set_error(sync_type, &"e".repeat(300), None)
            .await
            .expect("error");
        assert_eq!(record.error_details.map(|d| d.len()), Some(255));
    }
}
