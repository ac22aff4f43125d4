// Incremental log tailing with rotation/truncation detection.
// Each source remembers its byte offset and file identity between polls and keeps a
// bounded ring buffer of the most recent complete lines.

use crate::config::{LogSourceConfig, LogsConfig};
use crate::error::{CollectError, CollectResult};
use crate::models::{LogStats, LogTail, Status};
use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{Duration, timeout};

/// (device, inode) on Unix. Elsewhere every file compares equal and only truncation is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    #[cfg(not(unix))]
    fn of(_meta: &std::fs::Metadata) -> Self {
        Self { dev: 0, ino: 0 }
    }
}

/// Result of one poll of one source.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Complete lines appended since the previous successful poll, oldest first.
    pub appended: Vec<String>,
    pub status: Status,
    pub message: Option<String>,
    /// The file was replaced or truncated and reading restarted from the beginning.
    pub rotated: bool,
}

struct ReadChunk {
    identity: FileIdentity,
    next_offset: u64,
    lines: Vec<String>,
    rotated: bool,
}

/// Tail state of one configured log file.
pub struct LogSource {
    name: String,
    path: PathBuf,
    /// `None` until the first successful read.
    identity: Option<FileIdentity>,
    offset: u64,
    recent: VecDeque<String>,
    capacity: usize,
    last_status: Status,
    last_message: Option<String>,
}

impl LogSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            identity: None,
            offset: 0,
            recent: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            last_status: Status::Unavailable,
            last_message: Some("not polled yet".into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_tracking(&self) -> bool {
        self.identity.is_some()
    }

    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Reads whatever was appended since the last poll. A missing, unreadable or stalled
    /// file leaves offset, identity and the cached lines untouched.
    pub async fn poll(&mut self, max_read_bytes: u64, limit: Duration) -> PollOutcome {
        let read = timeout(
            limit,
            read_new(&self.path, self.identity, self.offset, max_read_bytes),
        )
        .await
        .unwrap_or(Err(CollectError::Timeout(limit)));

        match read {
            Ok(chunk) => {
                if chunk.rotated {
                    tracing::info!(log = %self.name, path = %self.path.display(), "log rotated or truncated; reading from start");
                }
                self.identity = Some(chunk.identity);
                self.offset = chunk.next_offset;
                for line in &chunk.lines {
                    if self.recent.len() == self.capacity {
                        self.recent.pop_front();
                    }
                    self.recent.push_back(line.clone());
                }
                self.last_status = Status::Ok;
                self.last_message = None;
                PollOutcome {
                    appended: chunk.lines,
                    status: Status::Ok,
                    message: None,
                    rotated: chunk.rotated,
                }
            }
            Err(e) => {
                tracing::debug!(log = %self.name, path = %self.path.display(), error = %e, "log source unavailable");
                let message = format!("{}: {}", self.path.display(), e);
                self.last_status = e.status();
                self.last_message = Some(message.clone());
                PollOutcome {
                    appended: Vec::new(),
                    status: self.last_status,
                    message: Some(message),
                    rotated: false,
                }
            }
        }
    }

    /// Current view of the source for a snapshot.
    pub fn tail(&self) -> LogTail {
        LogTail {
            name: self.name.clone(),
            path: self.path.to_string_lossy().into_owned(),
            lines: self.recent.iter().cloned().collect(),
            status: self.last_status,
            message: self.last_message.clone(),
        }
    }
}

async fn read_new(
    path: &Path,
    prev_identity: Option<FileIdentity>,
    offset: u64,
    max_read_bytes: u64,
) -> CollectResult<ReadChunk> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Err(CollectError::unavailable("not a regular file"));
    }
    let identity = FileIdentity::of(&meta);
    let size = meta.len();

    let rotated = prev_identity.is_some_and(|prev| prev != identity || size < offset);
    let start = if rotated || size < offset { 0 } else { offset };

    // Too much pending: jump ahead and read one byte early to tell whether the
    // jump landed on a line boundary.
    let skipped = size - start > max_read_bytes;
    let read_from = if skipped {
        size - max_read_bytes - 1
    } else {
        start
    };

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(read_from)).await?;
    let mut buf = Vec::with_capacity((size - read_from) as usize);
    file.take(size - read_from).read_to_end(&mut buf).await?;

    let body_start = if skipped {
        match buf.iter().position(|b| *b == b'\n') {
            Some(i) => i + 1,
            // Inside one overlong line: keep the window, minus the lookbehind byte.
            None => buf.len().min(1),
        }
    } else {
        0
    };
    let body = &buf[body_start..];

    let mut consumed = body.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    if consumed == 0 && body.len() as u64 >= max_read_bytes {
        // A single line longer than the read window; take it whole rather than stall.
        consumed = body.len();
    }

    let lines = String::from_utf8_lossy(&body[..consumed])
        .lines()
        .map(|l| l.trim_end().to_string())
        .collect();

    Ok(ReadChunk {
        identity,
        next_offset: read_from + (body_start + consumed) as u64,
        lines,
        rotated,
    })
}

/// All configured log sources, polled in configuration order.
pub struct LogTailer {
    sources: Vec<LogSource>,
    max_read_bytes: u64,
}

impl LogTailer {
    pub fn new(config: &LogsConfig) -> Self {
        Self::from_sources(
            &config.sources,
            config.lines_per_source,
            config.max_read_bytes,
        )
    }

    pub fn from_sources(sources: &[LogSourceConfig], capacity: usize, max_read_bytes: u64) -> Self {
        Self {
            sources: sources
                .iter()
                .map(|s| LogSource::new(&s.name, &s.path, capacity))
                .collect(),
            max_read_bytes: max_read_bytes.max(1),
        }
    }

    pub fn sources(&self) -> &[LogSource] {
        &self.sources
    }

    /// Polls every source once, each bounded by `limit`.
    pub async fn poll_all(&mut self, limit: Duration) -> Vec<PollOutcome> {
        let mut out = Vec::with_capacity(self.sources.len());
        for source in &mut self.sources {
            out.push(source.poll(self.max_read_bytes, limit).await);
        }
        out
    }

    /// Snapshot view of every source.
    pub fn stats(&self) -> LogStats {
        LogStats {
            sources: self.sources.iter().map(LogSource::tail).collect(),
        }
    }
}
