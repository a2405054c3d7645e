//! Parallel upload session for folder selections.
//!
//! Every file gets its own upload; byte progress is aggregated across all
//! of them. A failed file does not stop the others.

use std::sync::Arc;

use nasferry_transfer::{ProgressMeter, SelectedFile, TaskStatus, TransferTask};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::server::{FileServer, ProgressFn};
use crate::sink::TransferEventSink;
use crate::types::{CancelHandle, ParallelConfig, SessionOutcome};

/// Result of one spawned upload, tagged with its task index.
type Finished = (usize, Result<(), SessionError>);

/// Uploads a set of files concurrently.
pub struct ParallelUploadSession {
    server: Arc<dyn FileServer>,
    sink: Arc<dyn TransferEventSink>,
    config: ParallelConfig,
    tasks: Vec<TransferTask>,
    /// Aggregate counter over every task; `total()` is fixed at construction.
    meter: ProgressMeter,
    cancel: CancelHandle,
}

impl ParallelUploadSession {
    pub fn new(
        server: Arc<dyn FileServer>,
        sink: Arc<dyn TransferEventSink>,
        tasks: Vec<TransferTask>,
        config: ParallelConfig,
    ) -> Self {
        let total: u64 = tasks.iter().map(TransferTask::total_bytes).sum();
        Self {
            server,
            sink,
            config,
            tasks,
            meter: ProgressMeter::new(total),
            cancel: CancelHandle::new(),
        }
    }

    /// Builds a session for a folder selection rooted at remote `root`.
    ///
    /// Files whose relative path has no parent directory are skipped.
    pub fn from_selection(
        server: Arc<dyn FileServer>,
        sink: Arc<dyn TransferEventSink>,
        root: &str,
        files: &[SelectedFile],
        config: ParallelConfig,
    ) -> Result<Self, SessionError> {
        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            match TransferTask::for_selected_file(root, file)? {
                Some(task) => tasks.push(task),
                None => debug!(path = %file.relative_path, "skipping file without parent folder"),
            }
        }
        Ok(Self::new(server, sink, tasks, config))
    }

    /// Returns a handle that cancels this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn tasks(&self) -> &[TransferTask] {
        &self.tasks
    }

    pub fn total_bytes_all(&self) -> u64 {
        self.meter.total()
    }

    pub fn sent_bytes_all(&self) -> u64 {
        self.meter.sent()
    }

    /// Starts every upload (up to the concurrency limit) and waits for all
    /// of them, or for a cancel.
    pub async fn run(&mut self) -> SessionOutcome {
        if self.tasks.is_empty() {
            return SessionOutcome::Empty;
        }

        let cancel = self.cancel.token().clone();
        let limit = self.config.max_concurrent.unwrap_or(usize::MAX).max(1);
        let count = self.tasks.len();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(usize, u64)>();
        let mut running: JoinSet<Finished> = JoinSet::new();
        let mut next = 0usize;
        let mut succeeded = 0usize;
        let mut failures: Vec<String> = Vec::new();

        info!(
            files = count,
            total_bytes = self.meter.total(),
            limit = ?self.config.max_concurrent,
            "parallel upload started"
        );

        loop {
            while running.len() < limit && next < count && !cancel.is_cancelled() {
                if let Err(failure) = self.spawn_upload(next, &mut running, &progress_tx) {
                    failures.push(failure);
                }
                next += 1;
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    running.abort_all();
                    return self.halt();
                }
                Some((index, sent)) = progress_rx.recv() => {
                    self.apply_progress(index, sent);
                }
                joined = running.join_next() => {
                    while let Ok((index, sent)) = progress_rx.try_recv() {
                        self.apply_progress(index, sent);
                    }
                    match joined {
                        Some(Ok((index, Ok(())))) => {
                            self.finish_task(index);
                            succeeded += 1;
                            self.sink.on_file_finished(self.tasks[index].file_name(), succeeded, count);
                        }
                        Some(Ok((index, Err(e)))) => {
                            let task = &mut self.tasks[index];
                            let _ = task.finish(TaskStatus::Failed);
                            warn!(file = %task.remote_path(), error = %e, "upload failed");
                            failures.push(format!("{}: {e}", task.remote_path()));
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "upload task panicked");
                            failures.push(format!("upload task panicked: {e}"));
                        }
                        None => {}
                    }
                }
            }
        }

        // A panicked task never reports back; close out whatever is left.
        for task in &mut self.tasks {
            if task.status() == TaskStatus::InFlight {
                let _ = task.finish(TaskStatus::Failed);
            }
        }

        if failures.is_empty() {
            info!(files = count, bytes = self.meter.sent(), "parallel upload completed");
            self.sink.on_completed();
            SessionOutcome::Completed
        } else {
            let message = format!(
                "{} of {} uploads failed: {}",
                failures.len(),
                count,
                failures.join("; ")
            );
            error!(failed = failures.len(), files = count, "parallel upload finished with errors");
            self.sink.on_failed(&message);
            SessionOutcome::Failed(message)
        }
    }

    fn spawn_upload(
        &mut self,
        index: usize,
        running: &mut JoinSet<Finished>,
        progress_tx: &mpsc::UnboundedSender<(usize, u64)>,
    ) -> Result<(), String> {
        let task = &mut self.tasks[index];
        if let Err(e) = task.start() {
            warn!(file = %task.file_name(), error = %e, "cannot start task");
            return Err(format!("{}: {e}", task.remote_path()));
        }
        debug!(file = %task.remote_path(), bytes = task.total_bytes(), "upload started");

        let request = task.upload_request();
        let server = Arc::clone(&self.server);
        let cancel = self.cancel.token().clone();
        let tx = progress_tx.clone();
        let on_progress: ProgressFn = Arc::new(move |sent| {
            let _ = tx.send((index, sent));
        });

        running.spawn(async move {
            let result = server.upload(request, on_progress, cancel).await;
            (index, result)
        });
        Ok(())
    }

    /// Converts a cumulative report for one task into an aggregate update.
    fn apply_progress(&mut self, index: usize, sent: u64) {
        let delta = self.tasks[index].record_sent(sent);
        if delta == 0 {
            return;
        }
        self.meter.advance(delta);
        debug_assert_eq!(
            self.meter.sent(),
            self.tasks.iter().map(TransferTask::sent_bytes).sum::<u64>()
        );
        self.sink.on_progress(self.meter.percent());
        self.sink.on_transfer_rate(self.meter.bytes_per_second());
    }

    /// Marks a task succeeded, crediting bytes its transport never reported.
    fn finish_task(&mut self, index: usize) {
        let total = self.tasks[index].total_bytes();
        self.apply_progress(index, total);
        let task = &mut self.tasks[index];
        if let Err(e) = task.finish(TaskStatus::Succeeded) {
            warn!(file = %task.file_name(), error = %e, "unexpected task state");
        }
    }

    fn halt(&mut self) -> SessionOutcome {
        for task in &mut self.tasks {
            if !task.status().is_terminal() {
                let _ = task.finish(TaskStatus::Aborted);
            }
        }
        let aborted = self.tasks.len();
        self.tasks.clear();
        info!(files = aborted, bytes = self.meter.sent(), "parallel upload cancelled");
        self.sink.on_cancelled();
        SessionOutcome::Cancelled
    }
}
