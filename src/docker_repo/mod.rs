// Docker container listing via bollard

use crate::config::ContainersConfig;
use crate::error::{CollectError, CollectResult};
use crate::models::{ContainerInfo, ContainerList};
use bollard::Docker;
use bollard::models::ContainerSummary;
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, instrument};

/// Seconds bollard waits on the socket before giving up.
const DOCKER_CLIENT_TIMEOUT_SECS: u64 = 5;

pub struct DockerRepo {
    docker: Docker,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self { docker })
    }

    /// Client for an explicit socket path. Connecting is lazy; an unreachable socket shows
    /// up on the first list call.
    pub fn connect_with_socket(path: &str) -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix(
            path,
            DOCKER_CLIENT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )?;
        Ok(Self { docker })
    }

    pub fn from_config(config: &ContainersConfig) -> anyhow::Result<Self> {
        match config.socket.as_deref() {
            Some(path) => Self::connect_with_socket(path),
            None => Self::connect(),
        }
    }

    /// All containers with uptime for running ones. A runtime that cannot be reached fails
    /// the whole call; a container whose inspect fails just lacks an uptime.
    #[instrument(skip(self), fields(repo = "docker", operation = "list_containers"))]
    pub async fn list_containers(&self) -> CollectResult<ContainerList> {
        let options = ListContainersOptions {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| CollectError::unavailable(format!("container runtime unreachable: {}", e)))?;

        let now = Utc::now();
        let items = join_all(summaries.iter().map(|c| self.describe(c, now))).await;
        Ok(ContainerList { items })
    }

    async fn describe(&self, c: &ContainerSummary, now: DateTime<Utc>) -> ContainerInfo {
        let (id, name, state) = identify(c);

        let uptime_seconds = if state.eq_ignore_ascii_case("running") {
            match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => inspect
                    .state
                    .and_then(|s| s.started_at)
                    .and_then(|started| uptime_since(&started, now)),
                Err(e) => {
                    debug!(container = %name, error = %e, "inspect failed; uptime unknown");
                    None
                }
            }
        } else {
            None
        };

        ContainerInfo {
            id: short_id(&id).to_string(),
            name,
            status: state,
            image: c.image.clone().unwrap_or_default(),
            uptime_seconds,
        }
    }
}

/// Full id, display name (leading `/` stripped, short id when unnamed) and state.
fn identify(c: &ContainerSummary) -> (String, String, String) {
    let id = c.id.clone().unwrap_or_default();
    let name = c
        .names
        .as_ref()
        .and_then(|n| n.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| short_id(&id).to_string());
    let state = c
        .state
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());
    (id, name, state)
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Seconds from an RFC 3339 start time to `now`. Docker's zero time
/// (`0001-01-01T00:00:00Z`) and unparseable values yield `None`.
pub fn uptime_since(started_at: &str, now: DateTime<Utc>) -> Option<u64> {
    let started = DateTime::parse_from_rfc3339(started_at).ok()?.with_timezone(&Utc);
    if started.timestamp() <= 0 {
        return None;
    }
    let secs = (now - started).num_seconds();
    Some(secs.max(0) as u64)
}
