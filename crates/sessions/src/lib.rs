//! Upload sessions and archive job control.
//!
//! This crate holds the client-side **business logic** for moving files to
//! a NAS file service and for driving server-side archive jobs. It has no
//! HTTP dependency of its own: the app provides a `FileServer`
//! implementation that bridges to the actual client.
//!
//! # Flows
//!
//! - **Sequential upload**: one file in flight at a time, stops on the
//!   first failure, optional compensating delete on cancel.
//! - **Parallel upload**: every file of a folder selection at once,
//!   aggregated byte progress, per-file failures are non-fatal.
//! - **Archive job**: create, poll on a fixed interval, hand the download
//!   URL to the sink when ready.

pub mod archive;
pub mod error;
pub mod parallel;
pub mod sequential;
pub mod server;
pub mod sink;
pub mod types;

// Re-export primary types for convenience.
pub use archive::ArchiveJobController;
pub use error::SessionError;
pub use parallel::ParallelUploadSession;
pub use sequential::SequentialUploadSession;
pub use server::{FileServer, ProgressFn, ServerFuture};
pub use sink::{ChannelSink, SessionEvent, TransferEventSink};
pub use types::{
    ArchiveConfig, ArchiveOutcome, ArchiveState, ArchiveTarget, CancelHandle, ParallelConfig,
    SequentialConfig, SessionOutcome,
};

#[cfg(test)]
mod testing;
