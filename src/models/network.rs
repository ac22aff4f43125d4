// Network interface models

use serde::{Deserialize, Serialize};

/// Cumulative interface counters as read from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceStat {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub send_rate_kbps: f64,
    pub recv_rate_kbps: f64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errin: u64,
    pub errout: u64,
    pub dropin: u64,
    pub dropout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkStats {
    pub interfaces: Vec<InterfaceStat>,
}
