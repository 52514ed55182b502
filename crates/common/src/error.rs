use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Another run of the same sync type holds the record.
    #[error("sync of type {0} is already running")]
    SyncConflict(String),

    #[error("invalid sync state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("downstream rejected {failed} record(s): {details}")]
    PartialUpsertFailure { failed: usize, details: String },

    #[error("relation reconciliation failed: {0}")]
    RelationReconciliationFailure(String),
}

impl BridgeError {
    /// Conflicts are expected under concurrent triggers and should be retried later.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::SyncConflict(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
