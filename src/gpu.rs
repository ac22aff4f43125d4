// GPU stats from an external diagnostic tool (radeontop or nvidia-smi), one line per sample.

use crate::command::run_bounded;
use crate::config::{GpuConfig, GpuTool};
use crate::models::{GpuFields, GpuStats, Section, Status};
use tokio::time::Duration;

pub struct GpuCollector {
    tool: GpuTool,
    program: String,
    args: Vec<String>,
    limit: Duration,
}

impl GpuCollector {
    pub fn new(config: &GpuConfig) -> Self {
        let program = config
            .command
            .clone()
            .unwrap_or_else(|| config.tool.default_program().to_string());
        let args = config
            .args
            .clone()
            .unwrap_or_else(|| config.tool.default_args());
        Self {
            tool: config.tool,
            program,
            args,
            limit: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Never fails: every problem ends up as `unavailable` with the captured output attached.
    pub async fn sample(&self) -> Section<GpuStats> {
        let output = match run_bounded(&self.program, &self.args, self.limit).await {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, operation = "gpu_sample", "GPU tool failed");
                let data = GpuStats {
                    fields: None,
                    raw_output: e.captured_output().map(truncate_raw),
                };
                return Section::degraded(Status::Unavailable, e.to_string(), data);
            }
        };

        match parse_output(self.tool, &output) {
            Some(fields) => Section::ok(GpuStats {
                fields: Some(fields),
                raw_output: None,
            }),
            None => Section::degraded(
                Status::Unavailable,
                format!("could not parse {} output", self.program),
                GpuStats {
                    fields: None,
                    raw_output: Some(truncate_raw(&output)),
                },
            ),
        }
    }
}

const RAW_OUTPUT_LIMIT: usize = 512;

fn truncate_raw(s: &str) -> String {
    match s.char_indices().nth(RAW_OUTPUT_LIMIT) {
        Some((i, _)) => s[..i].to_string(),
        None => s.to_string(),
    }
}

pub fn parse_output(tool: GpuTool, output: &str) -> Option<GpuFields> {
    match tool {
        GpuTool::Radeontop => output.lines().find_map(parse_radeontop_line),
        GpuTool::NvidiaSmi => output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .and_then(parse_nvidia_smi_line),
    }
}

/// Parses a radeontop dump line, e.g.
/// `1700000000.1: bus 03, gpu 12.50%, ..., vram 10.23% 419.23mb, gtt 0.85% 34.81mb, mclk 100.00% 1.000ghz, sclk 35.00% 0.700ghz`.
pub fn parse_radeontop_line(line: &str) -> Option<GpuFields> {
    let (_, body) = line.split_once(':')?;
    let field = |key: &str| -> Option<Vec<f64>> {
        body.split(',').map(str::trim).find_map(|item| {
            let mut parts = item.split_whitespace();
            if parts.next()? != key {
                return None;
            }
            parts
                .map(|v| {
                    v.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%')
                        .parse::<f64>()
                        .ok()
                })
                .collect()
        })
    };
    let pair = |key: &str| -> Option<(f64, f64)> {
        match field(key)?.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    };

    let gpu_percent = *field("gpu")?.first()?;
    let (vram_percent, vram_mb) = pair("vram")?;
    let (gtt_percent, gtt_mb) = pair("gtt").unwrap_or((0.0, 0.0));
    let (mclk_percent, mclk_ghz) = pair("mclk").unwrap_or((0.0, 0.0));
    let (sclk_percent, sclk_ghz) = pair("sclk").unwrap_or((0.0, 0.0));
    Some(GpuFields::Radeontop {
        gpu_percent,
        vram_percent,
        vram_mb,
        gtt_percent,
        gtt_mb,
        mclk_percent,
        mclk_ghz,
        sclk_percent,
        sclk_ghz,
    })
}

/// Parses `name, utilization.gpu, memory.used, memory.total, temperature.gpu` in
/// nvidia-smi's `csv,noheader,nounits` format.
pub fn parse_nvidia_smi_line(line: &str) -> Option<GpuFields> {
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    let [name, util, used, total, temp] = cols.as_slice() else {
        return None;
    };
    if name.is_empty() {
        return None;
    }
    Some(GpuFields::NvidiaSmi {
        name: name.to_string(),
        gpu_percent: util.parse().ok()?,
        memory_used_mb: used.parse().ok()?,
        memory_total_mb: total.parse().ok()?,
        temperature_c: temp.parse().ok()?,
    })
}
