mod error;
mod extractors;
mod sync;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use bridge_common::types::ServiceInfo;
use bridge_config::{init_tracing, AppConfig};
use bridge_connectors::wiring::{changelog_service, clients_from_env};
use bridge_db::sync::pg_repository::PgSyncRecordRepository;
use bridge_engine::SyncRunner;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn SyncRunner>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn info() -> Json<ServiceInfo> {
    Json(ServiceInfo::new("bridge-api"))
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .merge(sync::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("failed to load config");
    init_tracing(&config.log_level);
    tracing::info!(service = "bridge-api", "starting");

    let pool = bridge_db::create_pool(&config.database_url)
        .await
        .expect("failed to create database pool");
    bridge_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let records = PgSyncRecordRepository::new(pool).with_stale_after(config.stale_after());
    let (gate, saas) = clients_from_env().expect("failed to configure gate/saas clients");
    let state = AppState {
        runner: Arc::new(changelog_service(
            records,
            gate,
            saas,
            config.call_timeout(),
        )),
    };

    let app = build_router(state);
    let addr: SocketAddr = config.bind_addr().parse().expect("invalid bind address");

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
