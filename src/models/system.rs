// CPU, memory, uptime/load and sensor models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuStats {
    pub overall_percent: f64,
    pub per_core: Vec<f64>,
}

/// Memory figures in bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UptimeStats {
    pub uptime_seconds: u64,
    pub load_avg: LoadAvg,
}

/// One temperature sensor, in degrees Celsius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub label: String,
    pub current: Option<f64>,
    pub high: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorStats {
    pub readings: Vec<SensorReading>,
}
