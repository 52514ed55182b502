pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/bridge/sync/{sync_type}",
        get(handlers::get_sync_status).post(handlers::start_sync),
    )
}
