// Collector error taxonomy and its mapping onto section status

use crate::models::Status;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    /// Optional subsystem, tool or device is absent.
    #[error("{0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

impl CollectError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Absent, forbidden, missing-on-disk and timed-out are expected conditions; anything
    /// else is reported as an error.
    pub fn status(&self) -> Status {
        match self {
            Self::Unavailable(_) | Self::PermissionDenied(_) | Self::Timeout(_) => {
                Status::Unavailable
            }
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    Status::Unavailable
                }
                _ => Status::Error,
            },
            Self::Failed(_) => Status::Error,
        }
    }
}

pub type CollectResult<T> = Result<T, CollectError>;
