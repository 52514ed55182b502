mod config;
mod jobs;

use std::sync::Arc;

use bridge_config::{init_tracing, AppConfig};
use bridge_connectors::wiring::{changelog_service, clients_from_env};
use bridge_db::sync::pg_repository::PgSyncRecordRepository;
use bridge_engine::SyncRunner;
use tokio::sync::watch;

use crate::config::SchedulerConfig;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load config");
    init_tracing(&config.log_level);
    let scheduler_config = SchedulerConfig::from_env().expect("failed to load scheduler config");
    tracing::info!(
        service = "bridge-scheduler",
        sync_types = ?scheduler_config.sync_types,
        interval_secs = scheduler_config.interval.as_secs(),
        "starting"
    );

    let pool = bridge_db::create_pool(&config.database_url)
        .await
        .expect("failed to connect to database");
    bridge_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let records = PgSyncRecordRepository::new(pool).with_stale_after(config.stale_after());
    let (gate, saas) = clients_from_env().expect("failed to configure gate/saas clients");
    let runner: Arc<dyn SyncRunner> = Arc::new(changelog_service(
        records,
        gate,
        saas,
        config.call_timeout(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = scheduler_config
        .sync_types
        .iter()
        .map(|sync_type| {
            tokio::spawn(jobs::run_job(
                runner.clone(),
                *sync_type,
                scheduler_config.interval,
                shutdown_rx.clone(),
            ))
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");

    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "job task panicked");
        }
    }
}
