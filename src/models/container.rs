// Docker container models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub image: String,
    /// Seconds since the container started; `None` when not running or unknown.
    pub uptime_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerList {
    pub items: Vec<ContainerInfo>,
}
