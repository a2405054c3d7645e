//! Adapter bridging the HTTP `Client` to the `FileServer` trait required
//! by the sessions crate.

use nasferry_client::Client;
use nasferry_protocol::JobId;
use nasferry_sessions::{ArchiveTarget, FileServer, ProgressFn, ServerFuture, SessionError};
use nasferry_transfer::UploadRequest;
use tokio_util::sync::CancellationToken;

/// Implements `FileServer` by delegating to the HTTP client.
pub struct HttpFileServer {
    client: Client,
}

impl HttpFileServer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl FileServer for HttpFileServer {
    fn upload(
        &self,
        request: UploadRequest,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> ServerFuture<'_, ()> {
        Box::pin(async move {
            match self.client.upload(&request, on_progress, &cancel).await {
                Ok(()) => Ok(()),
                Err(nasferry_client::Error::Cancelled) => Err(SessionError::Cancelled),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete(&self, remote_path: &str) -> ServerFuture<'_, ()> {
        let remote_path = remote_path.to_string();
        Box::pin(async move { Ok(self.client.delete(&remote_path).await?) })
    }

    fn create_archive(&self, target: &ArchiveTarget) -> ServerFuture<'_, JobId> {
        let target = target.clone();
        Box::pin(async move {
            let job_id = match target {
                ArchiveTarget::Folder(folder) => self.client.create_archive(&folder).await?,
                ArchiveTarget::Paths(paths) => self.client.create_bulk_archive(&paths).await?,
            };
            Ok(job_id)
        })
    }

    fn archive_progress(&self, job_id: &JobId) -> ServerFuture<'_, i32> {
        let job_id = job_id.clone();
        Box::pin(async move { Ok(self.client.archive_progress(&job_id).await?.progress) })
    }

    fn cancel_archive(&self, job_id: &JobId) -> ServerFuture<'_, String> {
        let job_id = job_id.clone();
        Box::pin(async move { Ok(self.client.cancel_archive(&job_id).await?) })
    }

    fn archive_url(&self, job_id: &JobId) -> Result<String, SessionError> {
        Ok(self.client.archive_url(job_id)?.to_string())
    }
}
