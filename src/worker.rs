// Polling scheduler: one task, one tick at a time. Each tick builds a snapshot and
// publishes it; shutdown is only observed between ticks.

use crate::aggregator::SnapshotAggregator;
use crate::config::MIN_POLLING_INTERVAL_MS;
use crate::hub::SnapshotSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};

/// Rate limit for "no receivers" log (avoid logging every tick when nobody is subscribed)
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Requested interval with the polling floor applied.
pub fn effective_interval(requested_ms: u64) -> Duration {
    Duration::from_millis(requested_ms.max(MIN_POLLING_INTERVAL_MS))
}

/// Counters the worker exposes for app stats logging and tests.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub ticks: AtomicU64,
    pub last_tick_ms: AtomicU64,
}

/// Aggregator, sink, and shutdown for the worker.
pub struct WorkerDeps<S: SnapshotSink + ?Sized> {
    pub aggregator: SnapshotAggregator,
    pub sink: Arc<S>,
    pub stats: Arc<WorkerStats>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Worker timing and logging config.
pub struct WorkerConfig {
    pub polling_interval_ms: u64,
    /// How often to log app stats (real seconds).
    pub stats_log_interval_secs: u64,
}

pub fn spawn<S: SnapshotSink + ?Sized>(
    deps: WorkerDeps<S>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        mut aggregator,
        sink,
        stats,
        mut shutdown_rx,
    } = deps;
    let WorkerConfig {
        polling_interval_ms,
        stats_log_interval_secs,
    } = config;

    let period = effective_interval(polling_interval_ms);
    if period.as_millis() as u64 != polling_interval_ms {
        tracing::warn!(
            requested_ms = polling_interval_ms,
            effective_ms = period.as_millis() as u64,
            "polling interval below floor; clamped"
        );
    }
    let stats_log_interval = Duration::from_secs(stats_log_interval_secs.max(1));

    tokio::spawn(async move {
        let mut tick = interval(period);
        // An overrunning tick is followed immediately by the next; missed ticks are not replayed.
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        stats_log_tick.reset();

        let mut last_no_receivers_warn: Option<Instant> = None;
        let mut last_receivers: usize = 0;

        tracing::info!(interval_ms = period.as_millis() as u64, "worker started");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("Worker shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let started = Instant::now();
                    let snapshot = Arc::new(aggregator.build().await);
                    let elapsed = started.elapsed();
                    stats.ticks.fetch_add(1, Ordering::Relaxed);
                    stats
                        .last_tick_ms
                        .store(elapsed.as_millis() as u64, Ordering::Relaxed);
                    if elapsed > period {
                        tracing::debug!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            interval_ms = period.as_millis() as u64,
                            "tick overran the polling interval"
                        );
                    }

                    last_receivers = sink.publish(snapshot);
                    if last_receivers == 0 {
                        let should_warn = last_no_receivers_warn
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL);
                        if should_warn {
                            tracing::debug!(
                                operation = "broadcast_snapshot",
                                "No active subscribers; snapshot not delivered"
                            );
                            last_no_receivers_warn = Some(Instant::now());
                        }
                    }
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        subscribers = last_receivers,
                        snapshots_published = stats.ticks.load(Ordering::Relaxed),
                        last_tick_ms = stats.last_tick_ms.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
            }
        }
    })
}
