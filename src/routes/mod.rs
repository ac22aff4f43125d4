// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::hub::SnapshotHub;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: SnapshotHub,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(hub: SnapshotHub, ws_connections: Arc<AtomicUsize>) -> Router {
    let state = AppState {
        hub,
        ws_connections,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/ws/stats", get(ws::ws_stats)) // WS /ws/stats
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
