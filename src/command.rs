// Bounded external command execution: the child is killed when the deadline passes and
// any stdout captured up to that point is handed back.

use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{Duration, Instant, sleep_until};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{program} not found")]
    NotFound { program: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}ms", .limit.as_millis())]
    TimedOut {
        program: String,
        limit: Duration,
        partial: String,
    },
    #[error("{program} exited with {code:?}")]
    Exited {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

impl CommandError {
    /// Whatever stdout was captured before the failure.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Self::TimedOut { partial, .. } => Some(partial),
            Self::Exited { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Runs `program` with `args`, returning stdout on a zero exit within `limit`.
pub async fn run_bounded(
    program: &str,
    args: &[String],
    limit: Duration,
) -> Result<String, CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::NotFound {
                program: program.to_string(),
            },
            _ => CommandError::Spawn {
                program: program.to_string(),
                source: e,
            },
        })?;

    let deadline = Instant::now() + limit;
    let mut captured = Vec::new();
    let mut chunk = [0u8; 4096];

    if let Some(mut stdout) = child.stdout.take() {
        loop {
            tokio::select! {
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => captured.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        tracing::debug!(program, error = %e, "stdout read failed");
                        break;
                    }
                },
                _ = sleep_until(deadline) => {
                    let _ = child.kill().await;
                    return Err(CommandError::TimedOut {
                        program: program.to_string(),
                        limit,
                        partial: String::from_utf8_lossy(&captured).into_owned(),
                    });
                }
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| CommandError::Spawn {
            program: program.to_string(),
            source: e,
        })?,
        _ = sleep_until(deadline) => {
            let _ = child.kill().await;
            return Err(CommandError::TimedOut {
                program: program.to_string(),
                limit,
                partial: String::from_utf8_lossy(&captured).into_owned(),
            });
        }
    };

    let output = String::from_utf8_lossy(&captured).into_owned();
    if !status.success() {
        return Err(CommandError::Exited {
            program: program.to_string(),
            code: status.code(),
            output,
        });
    }
    Ok(output)
}
