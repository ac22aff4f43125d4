// Storage (per configured path) and disk I/O models

use serde::{Deserialize, Serialize};

use super::Status;

/// Usage of the filesystem backing one configured path; sizes in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountUsage {
    pub path: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MountUsage {
    pub fn failed(path: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            total: 0,
            used: 0,
            free: 0,
            percent: 0.0,
            status,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageStats {
    pub mounts: Vec<MountUsage>,
}

/// Cumulative block device counters as read from the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCounters {
    pub disk: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskIoStat {
    pub disk: String,
    pub read_rate_mbps: f64,
    pub write_rate_mbps: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    pub total_read_gb: f64,
    pub total_write_gb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskIoStats {
    pub disks: Vec<DiskIoStat>,
}
