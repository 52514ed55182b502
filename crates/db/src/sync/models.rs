use std::fmt;
use std::str::FromStr;

use bridge_common::error::{BridgeError, BridgeResult};
use chrono::{DateTime, Duration, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of the persisted `error_details` column.
pub const ERROR_DETAILS_MAX_LEN: usize = 255;

/// Lower bound of the very first changelog window.
pub fn sync_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Postgres stores microseconds; truncate so in-memory and persisted values compare equal.
pub fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeSyncType {
    ChangelogImport,
    ChangelogImportAddress,
    ChangelogImportSite,
    ChangelogImportLegalEntity,
    SaasImport,
}

impl BridgeSyncType {
    pub const ALL: [BridgeSyncType; 5] = [
        Self::ChangelogImport,
        Self::ChangelogImportAddress,
        Self::ChangelogImportSite,
        Self::ChangelogImportLegalEntity,
        Self::SaasImport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChangelogImport => "CHANGELOG_IMPORT",
            Self::ChangelogImportAddress => "CHANGELOG_IMPORT_ADDRESS",
            Self::ChangelogImportSite => "CHANGELOG_IMPORT_SITE",
            Self::ChangelogImportLegalEntity => "CHANGELOG_IMPORT_LEGAL_ENTITY",
            Self::SaasImport => "SAAS_IMPORT",
        }
    }
}

impl fmt::Display for BridgeSyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeSyncType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown sync type: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    NotSynced,
    Running,
    Success,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSynced => "NOT_SYNCED",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "NOT_SYNCED" => Ok(Self::NotSynced),
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown sync status: {value}")),
        }
    }
}

/// How a successful `start` entered the RUNNING state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// New window beginning at the previous run's `started_at`.
    Fresh,
    /// Previous run failed; cursor and resume token are kept.
    Resumed,
    /// Previous run stopped reporting while RUNNING and was taken over.
    Reclaimed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub sync_type: BridgeSyncType,
    pub status: SyncStatus,
    pub from_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub count: i32,
    pub progress: f32,
    pub error_details: Option<String>,
    pub error_save: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn new(sync_type: BridgeSyncType, now: DateTime<Utc>) -> Self {
        Self {
            sync_type,
            status: SyncStatus::NotSynced,
            from_time: sync_epoch(),
            started_at: None,
            finished_at: None,
            count: 0,
            progress: 0.0,
            error_details: None,
            error_save: None,
            updated_at: now,
        }
    }

    /// Whether a RUNNING record has gone quiet for longer than `stale_after`.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Option<Duration>) -> bool {
        match stale_after {
            Some(limit) => self.status == SyncStatus::Running && now - self.updated_at > limit,
            None => false,
        }
    }

    /// Move the record into RUNNING.
    ///
    /// After SUCCESS or NOT_SYNCED the new window starts at the previous run's
    /// `started_at`, so nothing changed while that run was executing is missed.
    /// After ERROR (or a stale RUNNING) the cursor, `started_at` and the resume
    /// token are left untouched so the next run re-scans the same window.
    pub fn begin(
        &mut self,
        now: DateTime<Utc>,
        stale_after: Option<Duration>,
    ) -> BridgeResult<StartMode> {
        let mode = match self.status {
            SyncStatus::Running if self.is_stale(now, stale_after) => StartMode::Reclaimed,
            SyncStatus::Running => {
                return Err(BridgeError::SyncConflict(self.sync_type.to_string()));
            }
            SyncStatus::Error => StartMode::Resumed,
            SyncStatus::NotSynced | SyncStatus::Success => {
                self.from_time = self.started_at.unwrap_or_else(sync_epoch);
                self.error_save = None;
                self.started_at = Some(now);
                self.finished_at = None;
                self.count = 0;
                self.progress = 0.0;
                StartMode::Fresh
            }
        };

        self.error_details = None;
        self.status = SyncStatus::Running;
        self.updated_at = now;
        Ok(mode)
    }

    pub fn report_progress(
        &mut self,
        count: i32,
        progress: f32,
        now: DateTime<Utc>,
    ) -> BridgeResult<()> {
        if self.status != SyncStatus::Running {
            return Err(BridgeError::InvalidStateTransition {
                from: self.status.to_string(),
                to: "PROGRESS".to_string(),
            });
        }

        self.count = count;
        self.progress = progress;
        self.updated_at = now;
        Ok(())
    }

    /// Allowed from any state: a run may fail before its bookkeeping started.
    pub fn fail(&mut self, message: &str, resume_token: Option<&str>, now: DateTime<Utc>) {
        self.status = SyncStatus::Error;
        self.finished_at = Some(now);
        self.error_details = Some(truncate_error(message));
        self.error_save = resume_token.map(str::to_owned);
        self.updated_at = now;
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) -> BridgeResult<()> {
        if self.status != SyncStatus::Running {
            return Err(BridgeError::InvalidStateTransition {
                from: self.status.to_string(),
                to: SyncStatus::Success.to_string(),
            });
        }

        self.status = SyncStatus::Success;
        self.progress = 1.0;
        self.finished_at = Some(now);
        self.error_details = None;
        self.error_save = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn snapshot(&self) -> SyncRecordSnapshot {
        SyncRecordSnapshot {
            sync_type: self.sync_type,
            status: self.status,
            count: self.count,
            progress: self.progress,
            error_details: self.error_details.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Truncate on character boundaries to fit the `varchar(255)` column.
pub fn truncate_error(message: &str) -> String {
    message.chars().take(ERROR_DETAILS_MAX_LEN).collect()
}

/// Externally visible view of a sync record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecordSnapshot {
    #[serde(rename = "type")]
    pub sync_type: BridgeSyncType,
    pub status: SyncStatus,
    pub count: i32,
    pub progress: f32,
    pub error_details: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
