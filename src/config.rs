use serde::Deserialize;
use std::path::Path;

/// Polling intervals below this are clamped up to it.
pub const MIN_POLLING_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
    pub storage: StorageConfig,
    pub logs: LogsConfig,
    pub containers: ContainersConfig,
    pub gpu: GpuConfig,
    pub processes: ProcessesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            host: "0.0.0.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Upper bound for any single domain's sampling within a tick.
    pub collector_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            collector_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishingConfig {
    /// Max snapshots buffered per subscriber before a slow client starts skipping.
    pub broadcast_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How often to log app stats (subscribers, snapshots published) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub paths: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            paths: vec![default_storage_path().into()],
        }
    }
}

/// `/host_root` is where the host filesystem is usually mounted when running in a container.
fn default_storage_path() -> &'static str {
    if Path::new("/host_root").is_dir() {
        "/host_root"
    } else {
        "/"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogSourceConfig {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Ring buffer size per source.
    pub lines_per_source: usize,
    /// Max bytes read from one source in one poll.
    pub max_read_bytes: u64,
    pub sources: Vec<LogSourceConfig>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            lines_per_source: 25,
            max_read_bytes: 256 * 1024,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainersConfig {
    pub enabled: bool,
    /// Docker socket path; platform default (or DOCKER_HOST) when unset.
    pub socket: Option<String>,
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuTool {
    Radeontop,
    NvidiaSmi,
}

impl GpuTool {
    pub fn default_program(self) -> &'static str {
        match self {
            GpuTool::Radeontop => "radeontop",
            GpuTool::NvidiaSmi => "nvidia-smi",
        }
    }

    pub fn default_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            GpuTool::Radeontop => &["-d", "-", "-l", "1"],
            GpuTool::NvidiaSmi => &[
                "--query-gpu=name,utilization.gpu,memory.used,memory.total,temperature.gpu",
                "--format=csv,noheader,nounits",
            ],
        };
        args.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub enabled: bool,
    pub tool: GpuTool,
    /// Overrides the tool's default program.
    pub command: Option<String>,
    /// Overrides the tool's default arguments.
    pub args: Option<Vec<String>>,
    pub timeout_ms: u64,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tool: GpuTool::Radeontop,
            command: None,
            args: None,
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessesConfig {
    pub top_n: usize,
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

impl AppConfig {
    /// Loads `CONFIG_FILE` (default `config.toml`), then applies environment overrides.
    /// A missing default file means built-in defaults; an explicitly named file must exist.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var("CONFIG_FILE").ok();
        let path = explicit.clone().unwrap_or_else(|| "config.toml".into());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                tracing::info!(path = %path, "config file not found; using defaults");
                AppConfig::default()
            }
            Err(e) => return Err(anyhow::anyhow!("reading {}: {}", path, e)),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.finish()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.finish()?;
        Ok(config)
    }

    /// Applies `POLLING_INTERVAL_MS`, `STORAGE_PATHS`, `LOG_CONFIG` and
    /// `CONTAINER_RUNTIME_ENABLED` as returned by `lookup`. Malformed values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("POLLING_INTERVAL_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.polling.interval_ms = ms,
                Err(_) => tracing::warn!(value = %v, "invalid POLLING_INTERVAL_MS; ignored"),
            }
        }

        if let Some(v) = lookup("STORAGE_PATHS") {
            let paths: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            if paths.is_empty() {
                tracing::warn!(value = %v, "STORAGE_PATHS has no usable paths; ignored");
            } else {
                self.storage.paths = paths;
            }
        }

        if let Some(v) = lookup("LOG_CONFIG") {
            let sources: Vec<LogSourceConfig> = v
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .filter_map(|item| match item.split_once(':') {
                    Some((name, path)) => Some(LogSourceConfig {
                        name: name.trim().to_string(),
                        path: path.trim().to_string(),
                    }),
                    None => {
                        tracing::warn!(item = %item, "LOG_CONFIG item is not Name:Path; skipped");
                        None
                    }
                })
                .collect();
            if sources.is_empty() {
                tracing::warn!(value = %v, "LOG_CONFIG has no usable entries; ignored");
            } else {
                self.logs.sources = sources;
            }
        }

        if let Some(v) = lookup("CONTAINER_RUNTIME_ENABLED") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.containers.enabled = true,
                "0" | "false" | "no" => self.containers.enabled = false,
                _ => tracing::warn!(value = %v, "invalid CONTAINER_RUNTIME_ENABLED; ignored"),
            }
        }
    }

    /// Drops invalid list entries, clamps the polling interval, then validates.
    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.sanitize();
        self.validate()
    }

    fn sanitize(&mut self) {
        if self.polling.interval_ms < MIN_POLLING_INTERVAL_MS {
            tracing::warn!(
                requested_ms = self.polling.interval_ms,
                effective_ms = MIN_POLLING_INTERVAL_MS,
                "polling interval too low; clamped"
            );
            self.polling.interval_ms = MIN_POLLING_INTERVAL_MS;
        }

        self.storage.paths.retain(|p| {
            let keep = !p.trim().is_empty();
            if !keep {
                tracing::warn!("skipping empty storage path");
            }
            keep
        });
        for p in &mut self.storage.paths {
            *p = p.trim().to_string();
        }
        if self.storage.paths.is_empty() {
            self.storage.paths.push(default_storage_path().into());
        }

        self.logs.sources.retain(|s| {
            let keep = !s.name.trim().is_empty() && !s.path.trim().is_empty();
            if !keep {
                tracing::warn!(name = %s.name, path = %s.path, "skipping log source with empty name or path");
            }
            keep
        });
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.polling.collector_timeout_ms > 0,
            "polling.collector_timeout_ms must be > 0, got {}",
            self.polling.collector_timeout_ms
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.logs.lines_per_source > 0,
            "logs.lines_per_source must be > 0, got {}",
            self.logs.lines_per_source
        );
        anyhow::ensure!(
            self.logs.max_read_bytes > 0,
            "logs.max_read_bytes must be > 0, got {}",
            self.logs.max_read_bytes
        );
        anyhow::ensure!(
            self.gpu.timeout_ms > 0,
            "gpu.timeout_ms must be > 0, got {}",
            self.gpu.timeout_ms
        );
        anyhow::ensure!(
            self.processes.top_n > 0,
            "processes.top_n must be > 0, got {}",
            self.processes.top_n
        );
        Ok(())
    }
}
