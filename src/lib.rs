// Library for tests to access modules

pub mod aggregator;
pub mod command;
pub mod config;
pub mod docker_repo;
pub mod error;
pub mod gpu;
pub mod hub;
pub mod log_tail;
pub mod models;
pub mod probe;
pub mod rates;
pub mod routes;
pub mod sysinfo_repo;
pub mod worker;
