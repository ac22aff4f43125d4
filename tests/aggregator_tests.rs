// SnapshotAggregator: per-domain isolation, rates across ticks, optional subsystems

mod common;

use common::{Behavior, FakeProbe, echo_gpu, iface, quiet_config};
use hostpulse::aggregator::SnapshotAggregator;
use hostpulse::config::{GpuTool, LogSourceConfig};
use hostpulse::models::{GpuFields, Status};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn aggregator(probe: FakeProbe, config: &hostpulse::config::AppConfig) -> SnapshotAggregator {
    SnapshotAggregator::new(Arc::new(probe), config)
}

/// Names of sections whose status is not `ok`.
fn degraded(snapshot: &hostpulse::models::Snapshot) -> Vec<&'static str> {
    snapshot
        .statuses()
        .into_iter()
        .filter(|(_, s)| *s != Status::Ok)
        .map(|(name, _)| name)
        .collect()
}

#[tokio::test]
async fn healthy_probe_fills_every_host_section() {
    let mut config = quiet_config();
    echo_gpu(&mut config);
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(degraded(&snap), vec!["containers"]);
    assert_eq!(snap.cpu.data.per_core, vec![10.0, 15.0]);
    assert_eq!(snap.memory.data.total, 8_000);
    let paths: Vec<&str> = snap
        .storage
        .data
        .mounts
        .iter()
        .map(|m| m.path.as_str())
        .collect();
    assert_eq!(paths, vec!["/data", "/"]);
    assert_eq!(snap.uptime.data.uptime_seconds, 3600);
    assert_eq!(snap.processes.data.top_cpu[0].pid, 1);
    assert_eq!(snap.sensors.data.readings.len(), 1);
    assert!(snap.timestamp > 0);
}

#[tokio::test]
async fn failing_domain_is_error_and_others_unaffected() {
    let mut config = quiet_config();
    echo_gpu(&mut config);
    let mut agg = aggregator(FakeProbe::with("memory", Behavior::Fail), &config);

    let snap = agg.build().await;

    assert_eq!(snap.memory.status, Status::Error);
    assert_eq!(snap.memory.message.as_deref(), Some("memory exploded"));
    assert_eq!(snap.memory.data.total, 0);
    assert_eq!(degraded(&snap), vec!["memory", "containers"]);
    assert_eq!(snap.cpu.data.overall_percent, 12.5);
}

#[tokio::test]
async fn panicking_domain_is_contained() {
    let mut config = quiet_config();
    echo_gpu(&mut config);
    let mut agg = aggregator(FakeProbe::with("cpu", Behavior::Panic), &config);

    let snap = agg.build().await;

    assert_eq!(snap.cpu.status, Status::Error);
    assert!(
        snap.cpu
            .message
            .as_deref()
            .is_some_and(|m| m.contains("collector failed"))
    );
    assert_eq!(degraded(&snap), vec!["cpu", "containers"]);
    assert_eq!(snap.sensors.data.readings[0].current, Some(45.0));
}

#[tokio::test]
async fn missing_subsystem_is_unavailable() {
    let config = quiet_config();
    let mut agg = aggregator(FakeProbe::with("sensors", Behavior::Unavailable), &config);

    let snap = agg.build().await;

    assert_eq!(snap.sensors.status, Status::Unavailable);
    assert_eq!(snap.processes.status, Status::Ok);
}

#[tokio::test]
async fn stalled_domain_times_out_without_blocking_the_tick() {
    let config = quiet_config();
    let mut agg = aggregator(
        FakeProbe::with("storage", Behavior::Hang(Duration::from_millis(1500))),
        &config,
    );

    let started = std::time::Instant::now();
    let snap = agg.build().await;

    assert!(started.elapsed() < Duration::from_millis(1400));
    assert_eq!(snap.storage.status, Status::Unavailable);
    assert!(snap.storage.data.mounts.iter().all(|m| {
        m.status == Status::Unavailable && m.message.as_deref() == Some("timed out after 300ms")
    }));
    assert_eq!(snap.network.status, Status::Ok);
}

#[tokio::test]
async fn stalled_storage_path_only_marks_that_path() {
    let config = quiet_config();
    let mut agg = aggregator(
        FakeProbe::with_stalled_path("/", Duration::from_millis(1000)),
        &config,
    );

    let snap = agg.build().await;

    assert_eq!(snap.storage.status, Status::Ok);
    let mounts = &snap.storage.data.mounts;
    assert_eq!(mounts[0].path, "/data");
    assert_eq!(mounts[0].status, Status::Ok);
    assert_eq!(mounts[0].total, 100);
    assert_eq!(mounts[1].path, "/");
    assert_eq!(mounts[1].status, Status::Unavailable);
    assert_eq!(mounts[1].message.as_deref(), Some("timed out after 300ms"));
}

#[tokio::test]
async fn failing_storage_is_error() {
    let config = quiet_config();
    let mut agg = aggregator(FakeProbe::with("storage", Behavior::Fail), &config);

    let snap = agg.build().await;

    assert_eq!(snap.storage.status, Status::Error);
    assert_eq!(snap.storage.data.mounts.len(), 2);
    assert_eq!(
        snap.storage.data.mounts[0].message.as_deref(),
        Some("storage exploded")
    );
}

#[tokio::test]
async fn unreachable_container_runtime_only_degrades_containers() {
    let mut config = quiet_config();
    echo_gpu(&mut config);
    config.containers.enabled = true;
    config.containers.socket = Some("/nonexistent/hostpulse-test/docker.sock".into());
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.containers.status, Status::Unavailable);
    assert!(snap.containers.data.items.is_empty());
    assert_eq!(degraded(&snap), vec!["containers"]);
}

#[tokio::test]
async fn disabled_container_runtime_is_unavailable() {
    let config = quiet_config();
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.containers.status, Status::Unavailable);
    assert_eq!(
        snap.containers.message.as_deref(),
        Some("container monitoring disabled")
    );
}

#[tokio::test]
async fn network_rate_from_consecutive_ticks() {
    let config = quiet_config();
    let probe = FakeProbe::with_network(vec![
        vec![iface("eth0", 1000, 0), iface("wlan0", 0, 0)],
        vec![iface("eth0", 3000, 0)],
    ]);
    let mut agg = aggregator(probe, &config);

    let first = agg.build().await;
    assert!(
        first
            .network
            .data
            .interfaces
            .iter()
            .all(|i| i.send_rate_kbps == 0.0)
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = agg.build().await;
    let eth0 = &second.network.data.interfaces;
    assert_eq!(eth0.len(), 1);
    assert_eq!(eth0[0].name, "eth0");
    // 2000 bytes over roughly 0.2 s (plus build time) is at most 80 kbps.
    assert!(eth0[0].send_rate_kbps > 0.0);
    assert!(eth0[0].send_rate_kbps <= 80.0);
    assert_eq!(eth0[0].recv_rate_kbps, 0.0);
}

#[tokio::test]
async fn disk_totals_are_reported_in_gib() {
    let config = quiet_config();
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    let sda = &snap.disk_io.data.disks[0];
    assert_eq!(sda.disk, "sda");
    assert!((sda.total_read_gb - 1.0).abs() < 1e-9);
    assert!((sda.total_write_gb - 0.5).abs() < 1e-9);
    assert_eq!(sda.read_iops, 0.0);
}

#[tokio::test]
async fn gpu_disabled_by_default() {
    let config = quiet_config();
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.gpu.status, Status::Unavailable);
    assert!(snap.gpu.data.fields.is_none());
}

#[tokio::test]
async fn gpu_output_is_parsed() {
    let mut config = quiet_config();
    echo_gpu(&mut config);
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.gpu.status, Status::Ok);
    assert_eq!(
        snap.gpu.data.fields,
        Some(GpuFields::NvidiaSmi {
            name: "Test GPU".into(),
            gpu_percent: 37.0,
            memory_used_mb: 1024.0,
            memory_total_mb: 8192.0,
            temperature_c: 55.0,
        })
    );
}

#[tokio::test]
async fn gpu_tool_failure_keeps_output() {
    let mut config = quiet_config();
    config.gpu.enabled = true;
    config.gpu.tool = GpuTool::Radeontop;
    config.gpu.command = Some("echo".into());
    config.gpu.args = Some(vec!["no gpu here".into()]);
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.gpu.status, Status::Unavailable);
    assert_eq!(snap.gpu.data.raw_output.as_deref(), Some("no gpu here\n"));
}

#[tokio::test]
async fn gpu_timeout_is_unavailable() {
    let mut config = quiet_config();
    config.gpu.enabled = true;
    config.gpu.command = Some("sleep".into());
    config.gpu.args = Some(vec!["5".into()]);
    config.gpu.timeout_ms = 200;
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let started = std::time::Instant::now();
    let snap = agg.build().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(snap.gpu.status, Status::Unavailable);
    assert!(
        snap.gpu
            .message
            .as_deref()
            .is_some_and(|m| m.contains("timed out"))
    );
}

#[tokio::test]
async fn missing_gpu_tool_is_unavailable() {
    let mut config = quiet_config();
    config.gpu.enabled = true;
    config.gpu.command = Some("hostpulse-no-such-tool".into());
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.gpu.status, Status::Unavailable);
    assert!(snap.gpu.data.raw_output.is_none());
}

#[tokio::test]
async fn logs_follow_appends_across_ticks() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "a\nb\n").unwrap();

    let mut config = quiet_config();
    config.logs.lines_per_source = 3;
    config.logs.sources = vec![
        LogSourceConfig {
            name: "app".into(),
            path: path.to_string_lossy().into_owned(),
        },
        LogSourceConfig {
            name: "gone".into(),
            path: dir.path().join("missing.log").to_string_lossy().into_owned(),
        },
    ];
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let first = agg.build().await;
    assert_eq!(first.logs.status, Status::Ok);
    assert_eq!(first.logs.data.sources[0].lines, vec!["a", "b"]);
    assert_eq!(first.logs.data.sources[1].status, Status::Unavailable);

    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    writeln!(f, "c").unwrap();
    drop(f);

    let second = agg.build().await;
    assert_eq!(second.logs.data.sources[0].lines, vec!["a", "b", "c"]);
    assert_eq!(agg.logs().sources()[0].name(), "app");
}

#[tokio::test]
async fn logs_unavailable_when_no_source_readable() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = quiet_config();
    config.logs.sources = vec![LogSourceConfig {
        name: "gone".into(),
        path: dir.path().join("missing.log").to_string_lossy().into_owned(),
    }];
    let mut agg = aggregator(FakeProbe::healthy(), &config);

    let snap = agg.build().await;

    assert_eq!(snap.logs.status, Status::Unavailable);
    assert_eq!(snap.logs.data.sources.len(), 1);
}
