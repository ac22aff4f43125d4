// Builds one Snapshot per tick. Every domain runs in its own task under a timeout, in a
// fixed order; a failure, panic or stall in one domain only degrades that section.

use crate::config::AppConfig;
use crate::docker_repo::DockerRepo;
use crate::error::CollectResult;
use crate::gpu::GpuCollector;
use crate::log_tail::LogTailer;
use crate::models::*;
use crate::probe::HostProbe;
use crate::rates::{RateTracker, bytes_to_gib, bytes_to_kbps, bytes_to_mibps};
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};

/// Extra time the GPU domain gets beyond the tool's own timeout, so the tool is killed
/// (and its partial output kept) before the domain-level bound fires.
const GPU_GRACE: Duration = Duration::from_millis(500);

/// Why a domain produced no data this tick.
#[derive(Debug, Clone)]
struct DomainFailure {
    status: Status,
    message: String,
}

impl DomainFailure {
    fn into_section<T: Default>(self) -> Section<T> {
        Section::degraded(self.status, self.message, T::default())
    }
}

/// Awaits a domain task with a bound, turning timeouts, panics and collector errors into a
/// `DomainFailure`.
async fn settle<T>(
    domain: &'static str,
    limit: Duration,
    mut task: JoinHandle<CollectResult<T>>,
) -> Result<T, DomainFailure> {
    let failure = match timeout(limit, &mut task).await {
        Ok(Ok(Ok(value))) => return Ok(value),
        Ok(Ok(Err(e))) => DomainFailure {
            status: e.status(),
            message: e.to_string(),
        },
        Ok(Err(join)) => {
            tracing::error!(domain, error = %join, "collector panicked");
            DomainFailure {
                status: Status::Error,
                message: format!("collector failed: {}", join),
            }
        }
        Err(_) => {
            // Stops async tasks. A blocking read cannot be interrupted; it keeps its pool
            // thread until the read returns and its result is discarded.
            task.abort();
            DomainFailure {
                status: Status::Unavailable,
                message: format!("timed out after {}ms", limit.as_millis()),
            }
        }
    };
    match failure.status {
        Status::Error => tracing::warn!(domain, message = %failure.message, "domain degraded"),
        _ => tracing::debug!(domain, message = %failure.message, "domain unavailable"),
    }
    Err(failure)
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            Duration::ZERO
        })
}

pub struct SnapshotAggregator {
    probe: Arc<dyn HostProbe>,
    storage_paths: Arc<[String]>,
    top_n: usize,
    limit: Duration,
    network_rates: RateTracker<2>,
    disk_rates: RateTracker<4>,
    logs: LogTailer,
    gpu: Option<Arc<GpuCollector>>,
    /// `Err` carries the reason containers are not sampled (disabled or no client).
    docker: Result<Arc<DockerRepo>, String>,
}

impl SnapshotAggregator {
    pub fn new(probe: Arc<dyn HostProbe>, config: &AppConfig) -> Self {
        let docker = if config.containers.enabled {
            DockerRepo::from_config(&config.containers)
                .map(Arc::new)
                .map_err(|e| {
                    tracing::warn!(error = %e, "container runtime client unavailable");
                    format!("container runtime client unavailable: {}", e)
                })
        } else {
            Err("container monitoring disabled".to_string())
        };
        let gpu = config
            .gpu
            .enabled
            .then(|| Arc::new(GpuCollector::new(&config.gpu)));

        Self {
            probe,
            storage_paths: config.storage.paths.clone().into(),
            top_n: config.processes.top_n,
            limit: Duration::from_millis(config.polling.collector_timeout_ms),
            network_rates: RateTracker::new(),
            disk_rates: RateTracker::new(),
            logs: LogTailer::new(&config.logs),
            gpu,
            docker,
        }
    }

    pub fn logs(&self) -> &LogTailer {
        &self.logs
    }

    async fn blocking<T, F>(&self, domain: &'static str, f: F) -> Result<T, DomainFailure>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HostProbe) -> CollectResult<T> + Send + 'static,
    {
        let probe = self.probe.clone();
        let task = tokio::task::spawn_blocking(move || f(probe.as_ref()));
        settle(domain, self.limit, task).await
    }

    async fn isolated<T, Fut>(
        &self,
        domain: &'static str,
        limit: Duration,
        fut: Fut,
    ) -> Result<T, DomainFailure>
    where
        T: Send + 'static,
        Fut: Future<Output = CollectResult<T>> + Send + 'static,
    {
        settle(domain, limit, tokio::spawn(fut)).await
    }

    /// Samples every domain once, in wire order, and assembles the snapshot.
    pub async fn build(&mut self) -> Snapshot {
        let timestamp = unix_now().as_millis() as u64;

        let cpu = self
            .blocking("cpu", |p| p.cpu())
            .await
            .map_or_else(DomainFailure::into_section, Section::ok);

        let memory = self
            .blocking("memory", |p| p.memory())
            .await
            .map_or_else(DomainFailure::into_section, Section::ok);

        let storage = self.storage_section().await;

        let network = match self.blocking("network", |p| p.network_counters()).await {
            Ok(counters) => Section::ok(self.network_stats(counters)),
            Err(f) => f.into_section(),
        };

        let uptime = self
            .blocking("uptime", |p| p.uptime())
            .await
            .map_or_else(DomainFailure::into_section, Section::ok);

        let disk_io = match self.blocking("disk_io", |p| p.disk_counters()).await {
            Ok(counters) => Section::ok(self.disk_io_stats(counters)),
            Err(f) => f.into_section(),
        };

        let logs = self.logs_section().await;
        let gpu = self.gpu_section().await;
        let containers = self.containers_section().await;

        let top_n = self.top_n;
        let processes = self
            .blocking("processes", move |p| p.processes(top_n))
            .await
            .map_or_else(DomainFailure::into_section, Section::ok);

        let sensors = self
            .blocking("sensors", |p| p.sensors())
            .await
            .map_or_else(DomainFailure::into_section, Section::ok);

        Snapshot {
            timestamp,
            cpu,
            memory,
            storage,
            network,
            uptime,
            disk_io,
            logs,
            gpu,
            containers,
            processes,
            sensors,
        }
    }

    fn network_stats(&mut self, counters: Vec<InterfaceCounters>) -> NetworkStats {
        let now = unix_now().as_secs_f64();
        let interfaces = counters
            .into_iter()
            .map(|c| {
                let [send_bps, recv_bps] =
                    self.network_rates
                        .observe(&c.name, now, [c.bytes_sent, c.bytes_recv]);
                InterfaceStat {
                    name: c.name,
                    bytes_sent: c.bytes_sent,
                    bytes_recv: c.bytes_recv,
                    send_rate_kbps: bytes_to_kbps(send_bps),
                    recv_rate_kbps: bytes_to_kbps(recv_bps),
                    packets_sent: c.packets_sent,
                    packets_recv: c.packets_recv,
                    errin: c.errin,
                    errout: c.errout,
                    dropin: c.dropin,
                    dropout: c.dropout,
                }
            })
            .collect();
        self.network_rates.prune_unseen();
        NetworkStats { interfaces }
    }

    fn disk_io_stats(&mut self, counters: Vec<DiskCounters>) -> DiskIoStats {
        let now = unix_now().as_secs_f64();
        let disks = counters
            .into_iter()
            .map(|c| {
                let [read_bps, write_bps, read_iops, write_iops] = self.disk_rates.observe(
                    &c.disk,
                    now,
                    [c.read_bytes, c.write_bytes, c.read_ops, c.write_ops],
                );
                DiskIoStat {
                    disk: c.disk,
                    read_rate_mbps: bytes_to_mibps(read_bps),
                    write_rate_mbps: bytes_to_mibps(write_bps),
                    read_iops,
                    write_iops,
                    total_read_gb: bytes_to_gib(c.read_bytes),
                    total_write_gb: bytes_to_gib(c.write_bytes),
                }
            })
            .collect();
        self.disk_rates.prune_unseen();
        DiskIoStats { disks }
    }

    /// Each path is read in its own task and bounded on its own, so one stalled mount only
    /// marks that path.
    async fn storage_section(&self) -> Section<StorageStats> {
        let reads = self.storage_paths.iter().map(|path| {
            let path = path.clone();
            async move {
                let requested = path.clone();
                match self
                    .blocking("storage", move |p| p.storage(std::slice::from_ref(&requested)))
                    .await
                {
                    Ok(mut stats) => stats.mounts.pop().unwrap_or_else(|| {
                        MountUsage::failed(path, Status::Error, "no usage reported for path")
                    }),
                    Err(f) => MountUsage::failed(path, f.status, f.message),
                }
            }
        });
        let mounts = join_all(reads).await;
        storage_section(StorageStats { mounts })
    }

    async fn logs_section(&mut self) -> Section<LogStats> {
        let limit = self.limit;
        let polled = AssertUnwindSafe(self.logs.poll_all(limit))
            .catch_unwind()
            .await;
        if polled.is_err() {
            tracing::error!(domain = "logs", "log tailer panicked");
            return Section::error("log tailer failed");
        }

        let stats = self.logs.stats();
        let readable = stats.sources.iter().any(|s| s.status == Status::Ok);
        if stats.sources.is_empty() || readable {
            Section::ok(stats)
        } else {
            Section::degraded(Status::Unavailable, "no log source readable", stats)
        }
    }

    async fn gpu_section(&self) -> Section<GpuStats> {
        let Some(gpu) = self.gpu.clone() else {
            return Section::unavailable("GPU monitoring disabled");
        };
        let limit = self.limit.max(gpu.limit() + GPU_GRACE);
        self.isolated("gpu", limit, async move { Ok(gpu.sample().await) })
            .await
            .unwrap_or_else(DomainFailure::into_section)
    }

    async fn containers_section(&self) -> Section<ContainerList> {
        let docker = match &self.docker {
            Ok(d) => d.clone(),
            Err(reason) => return Section::unavailable(reason.clone()),
        };
        self.isolated("containers", self.limit, async move {
            docker.list_containers().await
        })
        .await
        .map_or_else(DomainFailure::into_section, Section::ok)
    }
}

/// Storage is degraded only when no configured path could be read; it is an error if any
/// path failed with one.
fn storage_section(stats: StorageStats) -> Section<StorageStats> {
    if stats.mounts.is_empty() || stats.mounts.iter().any(|m| m.status == Status::Ok) {
        return Section::ok(stats);
    }
    let status = if stats.mounts.iter().any(|m| m.status == Status::Error) {
        Status::Error
    } else {
        Status::Unavailable
    };
    Section::degraded(status, "no configured storage path could be read", stats)
}
