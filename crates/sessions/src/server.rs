//! File server trait.
//!
//! `FileServer` is implemented by the app on top of the HTTP client.
//! Using a trait keeps session logic decoupled from transport and testable
//! with mocks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nasferry_protocol::JobId;
use nasferry_transfer::UploadRequest;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::types::ArchiveTarget;

/// Receives the cumulative number of bytes sent for one upload.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Boxed future returned by [`FileServer`] operations.
pub type ServerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + Send + 'a>>;

/// Abstract connection to the NAS file service.
///
/// Implementations copy borrowed arguments before building the returned
/// future; only `&self` may be held across awaits.
pub trait FileServer: Send + Sync {
    /// Uploads one file. Dropping the future aborts the transfer.
    fn upload(
        &self,
        request: UploadRequest,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> ServerFuture<'_, ()>;

    /// Deletes a remote file or folder.
    fn delete(&self, remote_path: &str) -> ServerFuture<'_, ()>;

    /// Starts a server-side archive job.
    fn create_archive(&self, target: &ArchiveTarget) -> ServerFuture<'_, JobId>;

    /// Returns the raw progress value of a job (negative means failed).
    fn archive_progress(&self, job_id: &JobId) -> ServerFuture<'_, i32>;

    /// Asks the server to stop a job. The returned text is informational.
    fn cancel_archive(&self, job_id: &JobId) -> ServerFuture<'_, String>;

    /// Location of the finished archive.
    fn archive_url(&self, job_id: &JobId) -> Result<String, SessionError>;
}
