use std::time::Duration;

use bridge_common::error::{BridgeError, BridgeResult};
use bridge_db::sync::models::BridgeSyncType;
use bridge_engine::SyncScope;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub sync_types: Vec<BridgeSyncType>,
}

impl SchedulerConfig {
    /// Reads `SCHEDULER_INTERVAL_SECS` (default 300) and the comma-separated
    /// `SCHEDULER_SYNC_TYPES` (default `CHANGELOG_IMPORT`).
    pub fn from_env() -> BridgeResult<Self> {
        let interval_secs: u64 = std::env::var("SCHEDULER_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|e| BridgeError::Config(format!("invalid SCHEDULER_INTERVAL_SECS: {e}")))?;
        if interval_secs == 0 {
            return Err(BridgeError::Config(
                "SCHEDULER_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let raw = std::env::var("SCHEDULER_SYNC_TYPES")
            .unwrap_or_else(|_| BridgeSyncType::ChangelogImport.to_string());

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            sync_types: parse_sync_types(&raw)?,
        })
    }
}

/// Parses a comma-separated list of schedulable sync types, dropping
/// duplicates. Types without a changelog scope are rejected.
pub fn parse_sync_types(raw: &str) -> BridgeResult<Vec<BridgeSyncType>> {
    let mut types = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let sync_type: BridgeSyncType = name.parse().map_err(BridgeError::Config)?;
        if SyncScope::for_sync_type(sync_type).is_none() {
            return Err(BridgeError::Config(format!(
                "{sync_type} cannot be scheduled"
            )));
        }
        if !types.contains(&sync_type) {
            types.push(sync_type);
        }
    }

    if types.is_empty() {
        return Err(BridgeError::Config(
            "SCHEDULER_SYNC_TYPES contains no sync types".to_string(),
        ));
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn parses_and_dedupes_types() {
        let types =
            parse_sync_types(" changelog_import_site, CHANGELOG_IMPORT,changelog_import_site ,")
                .unwrap();
        assert_eq!(
            types,
            vec![
                BridgeSyncType::ChangelogImportSite,
                BridgeSyncType::ChangelogImport
            ]
        );
    }

    #[test]
    fn rejects_unknown_and_unschedulable_types() {
        assert!(matches!(
            parse_sync_types("CHANGELOG_IMPORT,NIGHTLY"),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            parse_sync_types("SAAS_IMPORT"),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(parse_sync_types(" , "), Err(BridgeError::Config(_))));
    }

    #[test]
    fn defaults_to_full_changelog_every_five_minutes() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        std::env::remove_var("SCHEDULER_INTERVAL_SECS");
        std::env::remove_var("SCHEDULER_SYNC_TYPES");

        let config = SchedulerConfig::from_env().unwrap();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.sync_types, vec![BridgeSyncType::ChangelogImport]);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        std::env::set_var("SCHEDULER_INTERVAL_SECS", "0");

        assert!(SchedulerConfig::from_env().is_err());

        std::env::remove_var("SCHEDULER_INTERVAL_SECS");
    }
}
