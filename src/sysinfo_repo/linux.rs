// Linux-specific helpers: /proc/diskstats and /sys/class/net drop counters.

use crate::error::CollectResult;
#[cfg(not(target_os = "linux"))]
use crate::error::CollectError;
use crate::models::DiskCounters;

/// Sector size the kernel uses for /proc/diskstats accounting, regardless of device.
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// Read rx/tx dropped packet counters for one interface. Returns (0, 0) when unavailable.
pub(super) fn read_interface_drops(interface_name: &str) -> (u64, u64) {
    #[cfg(target_os = "linux")]
    {
        let read = |counter: &str| -> u64 {
            let path = format!("/sys/class/net/{}/statistics/{}", interface_name, counter);
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0)
        };
        (read("rx_dropped"), read("tx_dropped"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface_name;
        (0, 0)
    }
}

/// Cumulative block device counters from /proc/diskstats.
pub(super) fn read_disk_counters() -> CollectResult<Vec<DiskCounters>> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/diskstats")?;
        Ok(parse_diskstats(&content))
    }
    #[cfg(not(target_os = "linux"))]
    Err(CollectError::unavailable(
        "disk I/O counters are not supported on this platform",
    ))
}

/// Parses /proc/diskstats. Loop, ram and zram devices are skipped, as are malformed lines.
///
/// Columns: major minor name reads merged sectors_read ms_read writes merged sectors_written ...
pub fn parse_diskstats(content: &str) -> Vec<DiskCounters> {
    content
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 10 {
                return None;
            }
            let name = cols[2];
            if ["loop", "ram", "zram"].iter().any(|p| name.starts_with(p)) {
                return None;
            }
            let num = |i: usize| cols[i].parse::<u64>().ok();
            Some(DiskCounters {
                disk: name.to_string(),
                read_ops: num(3)?,
                read_bytes: num(5)?.saturating_mul(DISKSTATS_SECTOR_BYTES),
                write_ops: num(7)?,
                write_bytes: num(9)?.saturating_mul(DISKSTATS_SECTOR_BYTES),
            })
        })
        .collect()
}
