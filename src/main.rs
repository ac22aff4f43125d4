use anyhow::Result;
use hostpulse::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        interval_ms = app_config.polling.interval_ms,
        storage_paths = ?app_config.storage.paths,
        log_sources = app_config.logs.sources.len(),
        containers = app_config.containers.enabled,
        gpu = app_config.gpu.enabled,
        "configuration loaded"
    );

    let hub = hub::SnapshotHub::new(app_config.publishing.broadcast_capacity);
    let probe: Arc<dyn probe::HostProbe> = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let aggregator = aggregator::SnapshotAggregator::new(probe, &app_config);

    let ws_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            aggregator,
            sink: Arc::new(hub.clone()),
            stats: Arc::new(worker::WorkerStats::default()),
            shutdown_rx,
        },
        worker::WorkerConfig {
            polling_interval_ms: app_config.polling.interval_ms,
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let app = routes::app(hub, ws_connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    // The worker finishes its in-flight tick before observing the signal.
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;
    tracing::info!("Worker stopped");

    Ok(())
}
