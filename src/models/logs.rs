// Log tail and GPU models

use serde::{Deserialize, Serialize};

use super::Status;

/// Current tail of one configured log source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTail {
    pub name: String,
    pub path: String,
    pub lines: Vec<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStats {
    pub sources: Vec<LogTail>,
}

/// Parsed fields of one GPU tool line. Which variant appears depends on the configured tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "kebab-case")]
pub enum GpuFields {
    Radeontop {
        gpu_percent: f64,
        vram_percent: f64,
        vram_mb: f64,
        gtt_percent: f64,
        gtt_mb: f64,
        mclk_percent: f64,
        mclk_ghz: f64,
        sclk_percent: f64,
        sclk_ghz: f64,
    },
    NvidiaSmi {
        name: String,
        gpu_percent: f64,
        memory_used_mb: f64,
        memory_total_mb: f64,
        temperature_c: f64,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<GpuFields>,
    /// Tool output kept for diagnostics when it could not be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}
