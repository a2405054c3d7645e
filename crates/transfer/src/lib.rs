//! Transfer units and byte-progress bookkeeping.
//!
//! A [`TransferTask`] is one file on its way to the server. Sessions own the
//! tasks and feed transport progress into them; [`ProgressMeter`] turns the
//! counters into percentages and throughput.

mod paths;
mod progress;
mod scanner;
mod types;

pub use paths::{join_remote, parent_segment, validate_relative_path};
pub use progress::{ProgressMeter, percent_of};
pub use scanner::{SelectedFile, scan_folder};
pub use types::{FileSource, TaskStatus, TransferTask, UploadRequest};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid task transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}
