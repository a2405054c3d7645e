//! Sequential upload session.
//!
//! Uploads an ordered queue one file at a time. The first failure ends the
//! session. Cancelling aborts the file in flight and, optionally, deletes
//! its partial copy on the server.

use std::sync::Arc;

use nasferry_transfer::{ProgressMeter, TaskStatus, TransferTask};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::server::{FileServer, ProgressFn};
use crate::sink::TransferEventSink;
use crate::types::{CancelHandle, SequentialConfig, SessionOutcome};

/// What the session does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Start the task at this index.
    Start(usize),
    /// Every task succeeded.
    Finished,
    /// Cancelled; nothing else may start.
    Halt,
}

/// Uploads files one after another.
pub struct SequentialUploadSession {
    server: Arc<dyn FileServer>,
    sink: Arc<dyn TransferEventSink>,
    config: SequentialConfig,
    queue: Vec<TransferTask>,
    /// Next task to start; the in-flight task while one is running.
    cursor: usize,
    cancel: CancelHandle,
}

impl SequentialUploadSession {
    pub fn new(
        server: Arc<dyn FileServer>,
        sink: Arc<dyn TransferEventSink>,
        queue: Vec<TransferTask>,
        config: SequentialConfig,
    ) -> Self {
        Self {
            server,
            sink,
            config,
            queue,
            cursor: 0,
            cancel: CancelHandle::new(),
        }
    }

    /// Returns a handle that cancels this session.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn tasks(&self) -> &[TransferTask] {
        &self.queue
    }

    /// Number of tasks that finished successfully.
    pub fn completed(&self) -> usize {
        self.queue
            .iter()
            .filter(|t| t.status() == TaskStatus::Succeeded)
            .count()
    }

    /// Runs the queue to its end, the first failure or a cancel.
    pub async fn run(&mut self) -> SessionOutcome {
        if self.queue.is_empty() {
            return SessionOutcome::Empty;
        }

        let server = Arc::clone(&self.server);
        let cancel = self.cancel.token().clone();
        let count = self.queue.len();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<(usize, u64)>();

        loop {
            let index = match self.advance() {
                Step::Start(index) => index,
                Step::Finished => {
                    info!(files = count, "sequential upload completed");
                    self.sink.on_completed();
                    return SessionOutcome::Completed;
                }
                Step::Halt => return self.halt(None).await,
            };

            let task = &mut self.queue[index];
            if let Err(e) = task.start() {
                error!(file = %task.file_name(), error = %e, "cannot start task");
                let message = e.to_string();
                self.sink.on_failed(&message);
                return SessionOutcome::Failed(message);
            }
            debug!(
                file = %task.file_name(),
                destination = %task.destination(),
                bytes = task.total_bytes(),
                position = index + 1,
                of = count,
                "upload started"
            );
            self.sink.on_file_started(task.file_name());

            let mut meter = ProgressMeter::new(task.total_bytes());
            let tx = progress_tx.clone();
            let on_progress: ProgressFn = Arc::new(move |sent| {
                let _ = tx.send((index, sent));
            });
            let mut upload = server.upload(task.upload_request(), on_progress, cancel.clone());

            let result = loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break None,
                    Some((from, sent)) = progress_rx.recv() => {
                        if from == index {
                            self.apply_progress(index, sent, &mut meter);
                        }
                    }
                    result = &mut upload => break Some(result),
                }
            };
            drop(upload);

            let Some(result) = result else {
                return self.halt(Some(index)).await;
            };

            while let Ok((from, sent)) = progress_rx.try_recv() {
                if from == index {
                    self.apply_progress(index, sent, &mut meter);
                }
            }

            match result {
                Ok(()) => {
                    let total = self.queue[index].total_bytes();
                    let tail = self.queue[index].record_sent(total);
                    if tail > 0 || total == 0 {
                        meter.advance(tail);
                        self.sink.on_progress(meter.percent());
                    }

                    let task = &mut self.queue[index];
                    if let Err(e) = task.finish(TaskStatus::Succeeded) {
                        warn!(file = %task.file_name(), error = %e, "unexpected task state");
                    }
                    info!(file = %task.file_name(), bytes = total, "upload finished");
                    self.cursor += 1;
                    self.sink.on_file_finished(task.file_name(), self.cursor, count);
                }
                Err(e) => {
                    let task = &mut self.queue[index];
                    let _ = task.finish(TaskStatus::Failed);
                    let message = format!("{}: {e}", task.file_name());
                    error!(file = %task.file_name(), error = %e, "upload failed");
                    self.sink.on_failed(&message);
                    return SessionOutcome::Failed(message);
                }
            }
        }
    }

    /// Decides what happens after the previous task reached a terminal state.
    fn advance(&self) -> Step {
        if self.cancel.is_cancelled() {
            Step::Halt
        } else if self.cursor < self.queue.len() {
            Step::Start(self.cursor)
        } else {
            Step::Finished
        }
    }

    /// Applies a cumulative byte report to the task at `index`.
    fn apply_progress(&mut self, index: usize, sent: u64, meter: &mut ProgressMeter) {
        let delta = self.queue[index].record_sent(sent);
        if delta == 0 {
            return;
        }
        meter.advance(delta);
        self.sink.on_progress(meter.percent());
        self.sink.on_transfer_rate(meter.bytes_per_second());
    }

    /// Ends a cancelled session. `interrupted` is the task that was in flight.
    async fn halt(&mut self, interrupted: Option<usize>) -> SessionOutcome {
        for task in self.queue.iter_mut().skip(self.cursor) {
            if !task.status().is_terminal() {
                let _ = task.finish(TaskStatus::Aborted);
            }
        }
        info!(
            completed = self.cursor,
            files = self.queue.len(),
            "sequential upload cancelled"
        );
        self.sink.on_cancelled();

        if let Some(index) = interrupted.filter(|_| self.config.compensating_delete) {
            let remote_path = self.queue[index].remote_path();
            tokio::time::sleep(self.config.cleanup_delay).await;
            match self.server.delete(&remote_path).await {
                Ok(()) => info!(path = %remote_path, "removed partial upload"),
                Err(e) => warn!(path = %remote_path, error = %e, "cleanup delete failed"),
            }
        }

        SessionOutcome::Cancelled
    }
}
