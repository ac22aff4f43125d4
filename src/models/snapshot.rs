// One tick's aggregated, immutable view of the host

use serde::{Deserialize, Serialize};

use super::{
    ContainerList, CpuStats, DiskIoStats, GpuStats, LogStats, MemoryStats, NetworkStats,
    ProcessStats, Section, SensorStats, StorageStats, UptimeStats,
};

/// Field order is the wire order and matches the order domains are sampled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix epoch milliseconds at the start of the tick.
    pub timestamp: u64,
    pub cpu: Section<CpuStats>,
    pub memory: Section<MemoryStats>,
    pub storage: Section<StorageStats>,
    pub network: Section<NetworkStats>,
    pub uptime: Section<UptimeStats>,
    pub disk_io: Section<DiskIoStats>,
    pub logs: Section<LogStats>,
    pub gpu: Section<GpuStats>,
    pub containers: Section<ContainerList>,
    pub processes: Section<ProcessStats>,
    pub sensors: Section<SensorStats>,
}

impl Snapshot {
    /// (name, status) for every section, in wire order.
    pub fn statuses(&self) -> [(&'static str, super::Status); 11] {
        [
            ("cpu", self.cpu.status),
            ("memory", self.memory.status),
            ("storage", self.storage.status),
            ("network", self.network.status),
            ("uptime", self.uptime.status),
            ("disk_io", self.disk_io.status),
            ("logs", self.logs.status),
            ("gpu", self.gpu.status),
            ("containers", self.containers.status),
            ("processes", self.processes.status),
            ("sensors", self.sensors.status),
        ]
    }
}
