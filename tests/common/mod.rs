// Shared test helpers: a scripted HostProbe and snapshot builders

#![allow(dead_code)]

use hostpulse::config::AppConfig;
use hostpulse::error::{CollectError, CollectResult};
use hostpulse::models::*;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// How one probe domain behaves when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    Unavailable,
    Fail,
    Panic,
    Hang(Duration),
}

/// HostProbe with fixed data and a per-domain failure switch.
pub struct FakeProbe {
    failing: Option<(&'static str, Behavior)>,
    /// Storage path whose read hangs for the given time.
    stalled_path: Option<(&'static str, Duration)>,
    /// Network counters handed out one per call; the last one repeats.
    network: Mutex<VecDeque<Vec<InterfaceCounters>>>,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self {
            failing: None,
            stalled_path: None,
            network: Mutex::new(VecDeque::from([vec![iface("eth0", 1000, 500)]])),
        }
    }

    pub fn with(domain: &'static str, behavior: Behavior) -> Self {
        Self {
            failing: Some((domain, behavior)),
            ..Self::healthy()
        }
    }

    pub fn with_network(samples: Vec<Vec<InterfaceCounters>>) -> Self {
        Self {
            network: Mutex::new(samples.into()),
            ..Self::healthy()
        }
    }

    pub fn with_stalled_path(path: &'static str, pause: Duration) -> Self {
        Self {
            stalled_path: Some((path, pause)),
            ..Self::healthy()
        }
    }

    fn gate(&self, domain: &'static str) -> CollectResult<()> {
        match self.failing {
            Some((d, behavior)) if d == domain => match behavior {
                Behavior::Ok => Ok(()),
                Behavior::Unavailable => Err(CollectError::unavailable(format!("no {}", domain))),
                Behavior::Fail => Err(CollectError::failed(format!("{} exploded", domain))),
                Behavior::Panic => panic!("{} collector panicked", domain),
                Behavior::Hang(pause) => {
                    std::thread::sleep(pause);
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }
}

pub fn iface(name: &str, bytes_sent: u64, bytes_recv: u64) -> InterfaceCounters {
    InterfaceCounters {
        name: name.into(),
        bytes_sent,
        bytes_recv,
        packets_sent: 10,
        packets_recv: 20,
        ..Default::default()
    }
}

fn process(pid: u32, cpu: f64, mem: f64) -> ProcessInfo {
    ProcessInfo {
        pid,
        name: format!("proc{}", pid),
        user: Some("root".into()),
        cpu_percent: cpu,
        mem_percent: mem,
        status: "Run".into(),
    }
}

impl hostpulse::probe::HostProbe for FakeProbe {
    fn cpu(&self) -> CollectResult<CpuStats> {
        self.gate("cpu")?;
        Ok(CpuStats {
            overall_percent: 12.5,
            per_core: vec![10.0, 15.0],
        })
    }

    fn memory(&self) -> CollectResult<MemoryStats> {
        self.gate("memory")?;
        Ok(MemoryStats {
            total: 8_000,
            used: 2_000,
            available: 6_000,
            percent: 25.0,
        })
    }

    fn storage(&self, paths: &[String]) -> CollectResult<StorageStats> {
        self.gate("storage")?;
        if let Some((stalled, pause)) = self.stalled_path
            && paths.iter().any(|p| p == stalled)
        {
            std::thread::sleep(pause);
        }
        Ok(StorageStats {
            mounts: paths
                .iter()
                .map(|p| MountUsage {
                    path: p.clone(),
                    total: 100,
                    used: 40,
                    free: 60,
                    percent: 40.0,
                    status: Status::Ok,
                    message: None,
                })
                .collect(),
        })
    }

    fn network_counters(&self) -> CollectResult<Vec<InterfaceCounters>> {
        self.gate("network")?;
        let mut queue = self
            .network
            .lock()
            .map_err(|_| CollectError::failed("poisoned"))?;
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }

    fn uptime(&self) -> CollectResult<UptimeStats> {
        self.gate("uptime")?;
        Ok(UptimeStats {
            uptime_seconds: 3600,
            load_avg: LoadAvg {
                one: 0.5,
                five: 0.4,
                fifteen: 0.3,
            },
        })
    }

    fn disk_counters(&self) -> CollectResult<Vec<DiskCounters>> {
        self.gate("disk_io")?;
        Ok(vec![DiskCounters {
            disk: "sda".into(),
            read_bytes: 1 << 30,
            write_bytes: 1 << 29,
            read_ops: 100,
            write_ops: 50,
        }])
    }

    fn processes(&self, top_n: usize) -> CollectResult<ProcessStats> {
        self.gate("processes")?;
        let all = [process(1, 5.0, 1.0), process(2, 1.0, 9.0)];
        Ok(ProcessStats {
            top_cpu: all.iter().take(top_n).cloned().collect(),
            top_mem: all.iter().rev().take(top_n).cloned().collect(),
        })
    }

    fn sensors(&self) -> CollectResult<SensorStats> {
        self.gate("sensors")?;
        Ok(SensorStats {
            readings: vec![SensorReading {
                label: "coretemp Package id 0".into(),
                current: Some(45.0),
                high: Some(80.0),
                critical: Some(100.0),
            }],
        })
    }
}

/// `quiet_config` with a collector timeout long enough for slow fake domains to finish.
pub fn patient_config() -> AppConfig {
    let mut config = quiet_config();
    config.polling.collector_timeout_ms = 5000;
    config
}

/// Config with containers and GPU disabled, no log sources and a short collector timeout.
pub fn quiet_config() -> AppConfig {
    AppConfig::load_from_str(
        r#"
[polling]
interval_ms = 500
collector_timeout_ms = 300

[storage]
paths = ["/data", "/"]

[containers]
enabled = false
"#,
    )
    .unwrap()
}

/// A GPU section that succeeds without any GPU: `echo` prints an nvidia-smi style line.
pub fn echo_gpu(config: &mut AppConfig) {
    config.gpu.enabled = true;
    config.gpu.tool = hostpulse::config::GpuTool::NvidiaSmi;
    config.gpu.command = Some("echo".into());
    config.gpu.args = Some(vec!["Test GPU, 37, 1024, 8192, 55".into()]);
    config.gpu.timeout_ms = 1000;
}

pub fn minimal_snapshot(timestamp: u64) -> Snapshot {
    Snapshot {
        timestamp,
        cpu: Section::ok(CpuStats {
            overall_percent: 1.0,
            per_core: vec![1.0],
        }),
        memory: Section::ok(MemoryStats::default()),
        storage: Section::ok(StorageStats::default()),
        network: Section::ok(NetworkStats::default()),
        uptime: Section::ok(UptimeStats::default()),
        disk_io: Section::ok(DiskIoStats::default()),
        logs: Section::ok(LogStats::default()),
        gpu: Section::unavailable("GPU monitoring disabled"),
        containers: Section::unavailable("container monitoring disabled"),
        processes: Section::ok(ProcessStats::default()),
        sensors: Section::unavailable("no sensors"),
    }
}
