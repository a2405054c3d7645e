use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::paths::{join_remote, parent_segment, validate_relative_path};
use crate::progress::percent_of;
use crate::scanner::SelectedFile;
use crate::TransferError;

/// Readable content of a task. Owned by the caller; sessions only read it.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A local file, streamed from disk at send time.
    Path(PathBuf),
    /// Content already in memory (drag-and-drop payloads, tests).
    Memory(Arc<[u8]>),
}

/// Lifecycle of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Aborted,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }
}

/// Everything a transport needs to send one file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: FileSource,
    pub destination: String,
    pub file_name: String,
    pub total_bytes: u64,
}

/// One file's transfer unit: source, destination and progress.
#[derive(Debug, Clone)]
pub struct TransferTask {
    source: FileSource,
    destination: String,
    file_name: String,
    total_bytes: u64,
    sent_bytes: u64,
    status: TaskStatus,
}

impl TransferTask {
    pub fn new(
        source: FileSource,
        destination: impl Into<String>,
        file_name: impl Into<String>,
        total_bytes: u64,
    ) -> Self {
        Self {
            source,
            destination: destination.into(),
            file_name: file_name.into(),
            total_bytes,
            sent_bytes: 0,
            status: TaskStatus::Pending,
        }
    }

    /// Builds a task for a local file, reading its size from metadata.
    pub fn from_path(path: &Path, destination: impl Into<String>) -> Result<Self, TransferError> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidPath(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::InvalidPath(format!("no file name: {}", path.display())))?;

        Ok(Self::new(
            FileSource::Path(path.to_path_buf()),
            destination,
            file_name,
            metadata.len(),
        ))
    }

    /// Builds a task from in-memory content.
    pub fn from_bytes(
        data: impl Into<Arc<[u8]>>,
        destination: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let data: Arc<[u8]> = data.into();
        let total = data.len() as u64;
        Self::new(FileSource::Memory(data), destination, file_name, total)
    }

    /// Builds a task for a file picked as part of a folder selection.
    ///
    /// The destination is `root` plus the parent segment of the relative path.
    /// Returns `Ok(None)` for files with no parent segment: there is no
    /// directory to derive for them.
    pub fn for_selected_file(root: &str, file: &SelectedFile) -> Result<Option<Self>, TransferError> {
        validate_relative_path(&file.relative_path)?;

        let Some(parent) = parent_segment(&file.relative_path) else {
            return Ok(None);
        };
        let file_name = file
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&file.relative_path);

        Ok(Some(Self::new(
            file.source.clone(),
            join_remote(root, parent),
            file_name,
            file.size,
        )))
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Full remote path of the file once uploaded.
    pub fn remote_path(&self) -> String {
        join_remote(&self.destination, &self.file_name)
    }

    pub fn percent(&self) -> f64 {
        percent_of(self.sent_bytes, self.total_bytes)
    }

    /// Pending → InFlight.
    pub fn start(&mut self) -> Result<(), TransferError> {
        self.transition(TaskStatus::InFlight)
    }

    /// Moves to a terminal status.
    ///
    /// A pending task may only be aborted; it never ran so it cannot have
    /// succeeded or failed.
    pub fn finish(&mut self, status: TaskStatus) -> Result<(), TransferError> {
        if !status.is_terminal() {
            return Err(TransferError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        self.transition(status)
    }

    /// Applies a cumulative byte position reported by the transport.
    ///
    /// Returns the newly confirmed bytes (0 for stale or duplicate reports,
    /// or when the task is not in flight).
    pub fn record_sent(&mut self, cumulative: u64) -> u64 {
        if self.status != TaskStatus::InFlight {
            return 0;
        }
        let target = cumulative.min(self.total_bytes);
        let delta = target.saturating_sub(self.sent_bytes);
        self.sent_bytes += delta;
        delta
    }

    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            source: self.source.clone(),
            destination: self.destination.clone(),
            file_name: self.file_name.clone(),
            total_bytes: self.total_bytes,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransferError> {
        let allowed = match (self.status, to) {
            (TaskStatus::Pending, TaskStatus::InFlight) => true,
            (TaskStatus::Pending, TaskStatus::Aborted) => true,
            (TaskStatus::InFlight, next) => next.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(TransferError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
