// Host probe backed by sysinfo, with Linux /proc and /sys readers for what sysinfo lacks

mod linux;

pub use linux::parse_diskstats;

use crate::error::{CollectError, CollectResult};
use crate::models::*;
use crate::probe::HostProbe;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use sysinfo::{Components, Disks, Networks, ProcessesToUpdate, System, Users};
use tracing::instrument;

pub struct SysinfoRepo {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> CollectResult<MutexGuard<'a, T>> {
    m.lock()
        .map_err(|e| CollectError::failed(format!("sysinfo {} lock poisoned: {}", what, e)))
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Baselines so the first tick's CPU and per-process usage have something to diff against.
        sys.refresh_cpu_all();
        sys.refresh_memory();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(disks),
            networks: Mutex::new(networks),
        }
    }

    fn mount_usage(mounts: &[MountSpace], requested: &str) -> MountUsage {
        let resolved = match std::fs::canonicalize(requested) {
            Ok(p) => p,
            Err(e) => {
                let status = CollectError::from(e).status();
                return MountUsage::failed(
                    requested,
                    status,
                    "path not found or not accessible",
                );
            }
        };

        let Some(disk) = longest_mount_match(
            mounts.iter().map(|m| m.mount_point.as_path()),
            &resolved,
        )
        .and_then(|i| mounts.get(i)) else {
            return MountUsage::failed(requested, Status::Unavailable, "no filesystem found for path");
        };

        let total = disk.total;
        let free = disk.available;
        let used = total.saturating_sub(free);
        MountUsage {
            path: requested.to_string(),
            total,
            used,
            free,
            percent: percent(used, total),
            status: Status::Ok,
            message: None,
        }
    }
}

/// Capacity of one mounted filesystem, copied out of `Disks` so path resolution runs
/// without holding the lock.
struct MountSpace {
    mount_point: PathBuf,
    total: u64,
    available: u64,
}

/// Index of the mount point that is the deepest ancestor of `path`.
fn longest_mount_match<'a>(
    mounts: impl Iterator<Item = &'a Path>,
    path: &Path,
) -> Option<usize> {
    mounts
        .enumerate()
        .filter(|(_, m)| path.starts_with(m))
        .max_by_key(|(_, m)| m.components().count())
        .map(|(i, _)| i)
}

impl HostProbe for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "cpu"))]
    fn cpu(&self) -> CollectResult<CpuStats> {
        let mut sys = lock(&self.sys, "system")?;
        sys.refresh_cpu_all();
        if sys.cpus().is_empty() {
            return Err(CollectError::unavailable("no CPU information available"));
        }
        Ok(CpuStats {
            overall_percent: (sys.global_cpu_usage() as f64).clamp(0.0, 100.0),
            per_core: sys
                .cpus()
                .iter()
                .map(|c| (c.cpu_usage() as f64).clamp(0.0, 100.0))
                .collect(),
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "memory"))]
    fn memory(&self) -> CollectResult<MemoryStats> {
        let mut sys = lock(&self.sys, "system")?;
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(CollectError::unavailable("memory information not available"));
        }
        let available = sys.available_memory();
        let used = total.saturating_sub(available);
        Ok(MemoryStats {
            total,
            used,
            available,
            percent: percent(used, total),
        })
    }

    #[instrument(skip(self, paths), fields(repo = "sysinfo", operation = "storage"))]
    fn storage(&self, paths: &[String]) -> CollectResult<StorageStats> {
        let spaces: Vec<MountSpace> = {
            let mut disks = lock(&self.disks, "disks")?;
            disks.refresh(true);
            disks
                .list()
                .iter()
                .map(|d| MountSpace {
                    mount_point: d.mount_point().to_path_buf(),
                    total: d.total_space(),
                    available: d.available_space(),
                })
                .collect()
        };
        let mounts = paths
            .iter()
            .map(|p| Self::mount_usage(&spaces, p))
            .collect();
        Ok(StorageStats { mounts })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "network_counters"))]
    fn network_counters(&self) -> CollectResult<Vec<InterfaceCounters>> {
        let mut networks = lock(&self.networks, "networks")?;
        networks.refresh(true);
        let mut out: Vec<InterfaceCounters> = networks
            .list()
            .iter()
            .map(|(name, data)| {
                let (dropin, dropout) = linux::read_interface_drops(name);
                InterfaceCounters {
                    name: name.clone(),
                    bytes_sent: data.total_transmitted(),
                    bytes_recv: data.total_received(),
                    packets_sent: data.total_packets_transmitted(),
                    packets_recv: data.total_packets_received(),
                    errin: data.total_errors_on_received(),
                    errout: data.total_errors_on_transmitted(),
                    dropin,
                    dropout,
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "uptime"))]
    fn uptime(&self) -> CollectResult<UptimeStats> {
        let load = System::load_average();
        Ok(UptimeStats {
            uptime_seconds: System::uptime(),
            load_avg: LoadAvg {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disk_counters"))]
    fn disk_counters(&self) -> CollectResult<Vec<DiskCounters>> {
        linux::read_disk_counters()
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "processes"))]
    fn processes(&self, top_n: usize) -> CollectResult<ProcessStats> {
        let mut sys = lock(&self.sys, "system")?;
        sys.refresh_memory();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        let total_memory = sys.total_memory();
        let users = Users::new_with_refreshed_list();

        // Entries for processes that exited or hid their details mid-scan are simply
        // absent or partial here; neither fails the collector.
        let all: Vec<ProcessInfo> = sys
            .processes()
            .values()
            .map(|p| ProcessInfo {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                user: p
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string()),
                cpu_percent: p.cpu_usage() as f64,
                mem_percent: percent(p.memory(), total_memory),
                status: p.status().to_string(),
            })
            .collect();
        if all.is_empty() {
            return Err(CollectError::unavailable("process table not readable"));
        }

        Ok(ProcessStats {
            top_cpu: top_by(&all, top_n, |p| p.cpu_percent),
            top_mem: top_by(&all, top_n, |p| p.mem_percent),
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sensors"))]
    fn sensors(&self) -> CollectResult<SensorStats> {
        let components = Components::new_with_refreshed_list();
        let readings: Vec<SensorReading> = components
            .list()
            .iter()
            .map(|c| SensorReading {
                label: c.label().to_string(),
                current: c.temperature().map(f64::from),
                high: c.max().map(f64::from),
                critical: c.critical().map(f64::from),
            })
            .collect();
        if readings.is_empty() {
            return Err(CollectError::unavailable("no sensors reported on this platform"));
        }
        Ok(SensorStats { readings })
    }
}

/// Highest `key` first, ties broken by pid for a stable order.
fn top_by(all: &[ProcessInfo], n: usize, key: impl Fn(&ProcessInfo) -> f64) -> Vec<ProcessInfo> {
    let mut sorted: Vec<&ProcessInfo> = all.iter().collect();
    sorted.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(Ordering::Equal)
            .then(a.pid.cmp(&b.pid))
    });
    sorted.into_iter().take(n).cloned().collect()
}
