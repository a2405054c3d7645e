//! Session configuration, outcomes and shared handles.

use std::time::Duration;

use nasferry_protocol::JobId;
use tokio_util::sync::CancellationToken;

/// Config for a [`SequentialUploadSession`](crate::SequentialUploadSession).
#[derive(Debug, Clone)]
pub struct SequentialConfig {
    /// Delete the interrupted file on the server after a cancel.
    pub compensating_delete: bool,
    /// Wait before the compensating delete, giving the server time to
    /// finish writing the partial file.
    pub cleanup_delay: Duration,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            compensating_delete: true,
            cleanup_delay: Duration::from_secs(2),
        }
    }
}

/// Config for a [`ParallelUploadSession`](crate::ParallelUploadSession).
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    /// Upper bound on simultaneous uploads. `None` starts every file at once.
    pub max_concurrent: Option<usize>,
}

/// Config for an [`ArchiveJobController`](crate::ArchiveJobController).
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub poll_interval: Duration,
    /// Give up after this many progress queries. `None` polls until the job
    /// finishes, fails or is cancelled.
    pub max_poll_attempts: Option<u32>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_poll_attempts: None,
        }
    }
}

/// How an upload session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Nothing to upload; no callbacks were made.
    Empty,
    Completed,
    Failed(String),
    Cancelled,
}

/// How an archive job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The archive is built and can be fetched from `url`.
    Ready { job_id: JobId, url: String },
    Failed(String),
    Cancelled,
}

/// Lifecycle of an archive job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveState {
    #[default]
    Idle,
    Requested,
    Polling,
    Ready,
    Downloading,
    Failed,
    Cancelled,
}

/// What to put in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveTarget {
    /// A single remote folder.
    Folder(String),
    /// Any mix of remote files and folders.
    Paths(Vec<String>),
}

impl ArchiveTarget {
    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Folder(folder) => folder.clone(),
            Self::Paths(paths) => format!("{} paths", paths.len()),
        }
    }
}

/// Cancels a running session from another task.
///
/// Cancelling is idempotent and cannot be undone.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}
