// Snapshot and per-domain models

mod container;
mod logs;
mod network;
mod process;
mod section;
mod snapshot;
mod storage;
mod system;

pub use container::{ContainerInfo, ContainerList};
pub use logs::{GpuFields, GpuStats, LogStats, LogTail};
pub use network::{InterfaceCounters, InterfaceStat, NetworkStats};
pub use process::{ProcessInfo, ProcessStats};
pub use section::{Section, Status};
pub use snapshot::Snapshot;
pub use storage::{DiskCounters, DiskIoStat, DiskIoStats, MountUsage, StorageStats};
pub use system::{CpuStats, LoadAvg, MemoryStats, SensorReading, SensorStats, UptimeStats};
