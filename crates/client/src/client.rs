//! NAS file service client.
//!
//! Async HTTP client using `reqwest`. Upload bodies are streamed so byte
//! progress can be reported while the request is in flight.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Response, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use nasferry_protocol::endpoints;
use nasferry_protocol::{BulkZipRequest, JobCreated, JobId, ZipProgress};
use nasferry_transfer::{FileSource, UploadRequest};

/// Size of the pieces in-memory sources are split into for progress reports.
const MEMORY_CHUNK_SIZE: usize = 64 * 1024;

/// Callback receiving the cumulative number of bytes handed to the socket.
pub type UploadProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Errors from the file service client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("request cancelled")]
    Cancelled,
}

/// NAS file service client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the server at `base_url` (e.g. `http://nas.local:5000`).
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let trimmed = base_url.trim_end_matches('/');
        Url::parse(trimmed).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;

        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: trimmed.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Uploads one file into `request.destination`.
    ///
    /// `on_progress` receives cumulative byte counts. Cancelling `cancel`
    /// drops the in-flight request, which aborts the connection.
    pub async fn upload(
        &self,
        request: &UploadRequest,
        on_progress: UploadProgressFn,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (body, length) = match &request.source {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(path).await?;
                let length = file.metadata().await?.len();
                (counted_body(ReaderStream::new(file), on_progress), length)
            }
            FileSource::Memory(data) => {
                let chunks: Vec<std::io::Result<Bytes>> = data
                    .chunks(MEMORY_CHUNK_SIZE)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                let length = data.len() as u64;
                (
                    counted_body(futures_util::stream::iter(chunks), on_progress),
                    length,
                )
            }
        };

        let part = Part::stream_with_length(body, length)
            .file_name(request.file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part(endpoints::UPLOAD_FIELD, part);

        debug!(
            file = %request.file_name,
            destination = %request.destination,
            bytes = length,
            "upload started"
        );

        let send = self
            .http
            .post(self.url(endpoints::UPLOAD))
            .query(&[(endpoints::PATH_PARAM, request.destination.as_str())])
            .multipart(form)
            .send();

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            resp = send => resp?,
        };
        check_status(resp).await?;

        info!(file = %request.file_name, destination = %request.destination, "upload finished");
        Ok(())
    }

    /// Deletes a remote file or folder.
    pub async fn delete(&self, remote_path: &str) -> Result<(), Error> {
        let resp = self
            .http
            .delete(self.url(endpoints::DELETE))
            .query(&[(endpoints::FILE_PARAM, remote_path)])
            .send()
            .await?;
        check_status(resp).await?;
        debug!(path = %remote_path, "deleted");
        Ok(())
    }

    /// Starts archive creation for a remote folder.
    pub async fn create_archive(&self, folder: &str) -> Result<JobId, Error> {
        let resp = self
            .http
            .get(self.url(endpoints::DOWNLOAD_ZIP))
            .query(&[(endpoints::FOLDER_PARAM, folder)])
            .send()
            .await?;
        let body = check_status(resp).await?.bytes().await?;
        let created: JobCreated = serde_json::from_slice(&body)?;
        Ok(created.job_id)
    }

    /// Starts archive creation for several remote paths.
    pub async fn create_bulk_archive(&self, paths: &[String]) -> Result<JobId, Error> {
        let req = BulkZipRequest {
            paths: paths.to_vec(),
        };
        let resp = self
            .http
            .post(self.url(endpoints::BULK_DOWNLOAD_ZIP))
            .json(&req)
            .send()
            .await?;
        let body = check_status(resp).await?.bytes().await?;
        let created: JobCreated = serde_json::from_slice(&body)?;
        Ok(created.job_id)
    }

    /// Queries the progress of an archive job.
    pub async fn archive_progress(&self, job_id: &JobId) -> Result<ZipProgress, Error> {
        let resp = self
            .http
            .get(self.url(endpoints::ZIP_PROGRESS))
            .query(&[(endpoints::JOB_ID_PARAM, job_id.as_str())])
            .send()
            .await?;
        let body = check_status(resp).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Asks the server to stop an archive job. Returns the informational text.
    pub async fn cancel_archive(&self, job_id: &JobId) -> Result<String, Error> {
        let resp = self
            .http
            .post(self.url(endpoints::CANCEL_ZIP))
            .query(&[(endpoints::JOB_ID_PARAM, job_id.as_str())])
            .send()
            .await?;
        Ok(check_status(resp).await?.text().await?)
    }

    /// URL of the finished archive for `job_id`.
    pub fn archive_url(&self, job_id: &JobId) -> Result<Url, Error> {
        Url::parse_with_params(
            &self.url(endpoints::DOWNLOAD_ZIP_FILE),
            &[(endpoints::JOB_ID_PARAM, job_id.as_str())],
        )
        .map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Streams the finished archive into `dest_dir`.
    ///
    /// The file name comes from `Content-Disposition` when the server sends
    /// one, `{job_id}.zip` otherwise. `on_progress` receives the bytes written
    /// so far and the expected total when known.
    pub async fn download_archive<F>(
        &self,
        job_id: &JobId,
        dest_dir: &Path,
        mut on_progress: F,
    ) -> Result<PathBuf, Error>
    where
        F: FnMut(u64, Option<u64>),
    {
        let url = self.archive_url(job_id)?;
        let resp = check_status(self.http.get(url).send().await?).await?;

        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| format!("{job_id}.zip"));
        let total = resp.content_length();

        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(&file_name);
        let mut file = tokio::fs::File::create(&dest).await?;

        let mut received = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let data = chunk?;
            file.write_all(&data).await?;
            received += data.len() as u64;
            on_progress(received, total);
        }
        file.flush().await?;

        info!(job = %job_id, path = %dest.display(), bytes = received, "archive downloaded");
        Ok(dest)
    }
}

/// Wraps a byte stream so each chunk handed to the request body is counted.
fn counted_body<S>(stream: S, on_progress: UploadProgressFn) -> Body
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
{
    let mut sent = 0u64;
    Body::wrap_stream(stream.map(move |chunk| {
        if let Ok(data) = &chunk {
            sent += data.len() as u64;
            on_progress(sent);
        }
        chunk
    }))
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Extracts a safe file name from a `Content-Disposition` header value.
fn attachment_file_name(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix("filename=")
            .map(|v| v.trim_matches('"').to_string())
    })?;
    Path::new(&raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
}
