use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose debug output drowns the sync logs.
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn"];

/// Filter used when `RUST_LOG` is not set: `level` for everything except the
/// chatty dependencies.
pub fn default_filter(level: &str) -> String {
    std::iter::once(level)
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`,
/// which is normally `AppConfig::log_level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    fmt().with_env_filter(filter).with_target(true).init();
}
