// WebSocket push of every published snapshot

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::hub::Published;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the connection count on drop (connect = +1, drop = -1).
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) async fn ws_stats(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        // Subscribe before reading the latest snapshot so nothing published in between is missed.
        let mut rx = state.hub.subscribe();
        let initial = state.hub.latest_published();
        if let Err(e) = stream_stats(socket, &mut rx, initial, state.ws_connections).await {
            tracing::info!("Stats stream error: {}", e);
        }
    })
}

/// Sends the snapshot unless its sequence number was already sent (the latest snapshot can
/// arrive both from the watch slot and the broadcast). Returns false when the client is gone
/// or too slow.
async fn send_snapshot(
    socket: &mut WebSocket,
    published: &Published,
    last_sent: &mut Option<u64>,
) -> anyhow::Result<bool> {
    if last_sent.is_some_and(|seq| published.seq <= seq) {
        return Ok(true);
    }
    let json = serde_json::to_string(published.snapshot.as_ref())?;
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    if r.is_err() || r.unwrap_or(Ok(())).is_err() {
        return Ok(false);
    }
    *last_sent = Some(published.seq);
    Ok(true)
}

async fn stream_stats(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<Published>,
    initial: Option<Published>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, Ordering::Relaxed);
    let _guard = WsConnectionGuard(conn_count);
    tracing::info!("Client connected to stats stream");

    let mut last_sent: Option<u64> = None;
    if let Some(published) = initial
        && !send_snapshot(&mut socket, &published, &mut last_sent).await?
    {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.reset();
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(published) => {
                        if !send_snapshot(&mut socket, &published, &mut last_sent).await? {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/stats client lagged, skipped {} snapshots", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if r.is_err() || r.unwrap_or(Ok(())).is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("Client disconnected from stats stream");
    Ok(())
}
