//! Event sink contract between sessions and the rendering layer.

use nasferry_protocol::JobId;
use tokio::sync::mpsc;

/// Receives progress and state changes from sessions and archive jobs.
///
/// Every session reports exactly one of `on_completed`, `on_failed` or
/// `on_cancelled` (an archive job reports `on_ready_for_download` instead
/// of `on_completed`). Callbacks are synchronous and should return quickly.
pub trait TransferEventSink: Send + Sync {
    /// Percentage in `0.0..=100.0`.
    fn on_progress(&self, percent: f64);

    /// Average throughput of the current operation.
    fn on_transfer_rate(&self, _bytes_per_second: f64) {}

    /// A sequential upload moved on to `name`.
    fn on_file_started(&self, _name: &str) {}

    /// `name` finished uploading; `completed` of `total` files are done.
    fn on_file_finished(&self, _name: &str, _completed: usize, _total: usize) {}

    fn on_completed(&self);

    fn on_failed(&self, message: &str);

    fn on_cancelled(&self);

    /// The archive for `job_id` can be fetched from `url`.
    fn on_ready_for_download(&self, _job_id: &JobId, _url: &str) {}
}

/// Sink callback as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress(f64),
    TransferRate(f64),
    FileStarted(String),
    FileFinished {
        name: String,
        completed: usize,
        total: usize,
    },
    Completed,
    Failed(String),
    Cancelled,
    ReadyForDownload { job_id: JobId, url: String },
}

impl SessionEvent {
    /// Completed, failed, cancelled or ready for download.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed(_) | Self::Cancelled | Self::ReadyForDownload { .. }
        )
    }
}

/// Forwards every callback as a [`SessionEvent`] over a channel.
///
/// Events are dropped silently once the receiver is gone.
pub struct ChannelSink {
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver for its events.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (Self { events_tx }, events_rx)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl TransferEventSink for ChannelSink {
    fn on_progress(&self, percent: f64) {
        self.emit(SessionEvent::Progress(percent));
    }

    fn on_transfer_rate(&self, bytes_per_second: f64) {
        self.emit(SessionEvent::TransferRate(bytes_per_second));
    }

    fn on_file_started(&self, name: &str) {
        self.emit(SessionEvent::FileStarted(name.to_string()));
    }

    fn on_file_finished(&self, name: &str, completed: usize, total: usize) {
        self.emit(SessionEvent::FileFinished {
            name: name.to_string(),
            completed,
            total,
        });
    }

    fn on_completed(&self) {
        self.emit(SessionEvent::Completed);
    }

    fn on_failed(&self, message: &str) {
        self.emit(SessionEvent::Failed(message.to_string()));
    }

    fn on_cancelled(&self) {
        self.emit(SessionEvent::Cancelled);
    }

    fn on_ready_for_download(&self, job_id: &JobId, url: &str) {
        self.emit(SessionEvent::ReadyForDownload {
            job_id: job_id.clone(),
            url: url.to_string(),
        });
    }
}
