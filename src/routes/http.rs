// GET handlers: version, latest snapshot

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/snapshot: most recent snapshot, or 503 before the first tick completes.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> Response {
    match state.hub.latest() {
        Some(snapshot) => axum::Json(snapshot.as_ref().clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no snapshot yet").into_response(),
    }
}
