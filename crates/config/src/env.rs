use bridge_common::error::{BridgeError, BridgeResult};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// A RUNNING record untouched for this long may be reclaimed by the next start.
    pub sync_stale_after_secs: u64,
    /// Upper bound for any single Gate or SaaS call made by a run.
    pub sync_call_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> BridgeResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: get_var_or("PORT", "8080")
                .parse()
                .map_err(|e| BridgeError::Config(format!("invalid PORT: {e}")))?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            sync_stale_after_secs: get_var_or("SYNC_STALE_AFTER_SECS", "3600")
                .parse()
                .map_err(|e| BridgeError::Config(format!("invalid SYNC_STALE_AFTER_SECS: {e}")))?,
            sync_call_timeout_secs: get_var_or("SYNC_CALL_TIMEOUT_SECS", "300")
                .parse()
                .map_err(|e| BridgeError::Config(format!("invalid SYNC_CALL_TIMEOUT_SECS: {e}")))?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.sync_stale_after_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_call_timeout_secs)
    }
}

fn get_var(key: &str) -> BridgeResult<String> {
    env::var(key).map_err(|_| BridgeError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}
