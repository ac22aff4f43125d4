// Per-domain status envelope shared by every snapshot section

use serde::{Deserialize, Serialize};

/// Health of one snapshot section; serializes lowercase ("ok", "unavailable", "error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Unavailable,
    Error,
}

/// One domain's data plus its status. On failure `data` holds whatever partial
/// values were obtained (or the type's default) and `message` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section<T> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Section<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: Status::Ok,
            message: None,
            data,
        }
    }

    pub fn degraded(status: Status, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            message: Some(message.into()),
            data,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl<T: Default> Section<T> {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::degraded(Status::Unavailable, message, T::default())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::degraded(Status::Error, message, T::default())
    }
}
