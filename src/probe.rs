// Point-in-time host reads. Each method samples one domain and is called from a blocking
// task, once per tick, in the aggregator's fixed order.

use crate::error::CollectResult;
use crate::models::{
    CpuStats, DiskCounters, InterfaceCounters, MemoryStats, ProcessStats, SensorStats,
    StorageStats, UptimeStats,
};

pub trait HostProbe: Send + Sync + 'static {
    fn cpu(&self) -> CollectResult<CpuStats>;

    fn memory(&self) -> CollectResult<MemoryStats>;

    /// Usage of the filesystem behind each path, in the given order. Paths that cannot be
    /// resolved are reported with their own status instead of failing the call.
    fn storage(&self, paths: &[String]) -> CollectResult<StorageStats>;

    /// Cumulative per-interface counters.
    fn network_counters(&self) -> CollectResult<Vec<InterfaceCounters>>;

    fn uptime(&self) -> CollectResult<UptimeStats>;

    /// Cumulative per-disk I/O counters.
    fn disk_counters(&self) -> CollectResult<Vec<DiskCounters>>;

    /// Top `top_n` processes by CPU and by memory.
    fn processes(&self, top_n: usize) -> CollectResult<ProcessStats>;

    fn sensors(&self) -> CollectResult<SensorStats>;
}
