//! Server-side archive jobs.
//!
//! Requests an archive, polls its progress on a fixed interval and hands
//! the download location to the sink once the server reports completion.
//! Each run gets a ticket; results carrying a stale ticket are dropped, so
//! a poll answered after `cancel()` produces no callbacks.

use std::sync::Arc;

use nasferry_protocol::{JobId, ProgressReading};
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::server::FileServer;
use crate::sink::TransferEventSink;
use crate::types::{ArchiveConfig, ArchiveOutcome, ArchiveState, ArchiveTarget};

/// What the poll loop does after a progress result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollStep {
    Continue,
    Stop(ArchiveOutcome),
}

/// Drives one archive job at a time.
///
/// Sink callbacks run while the job slot is locked; sinks must not call
/// back into the controller.
pub struct ArchiveJobController {
    server: Arc<dyn FileServer>,
    sink: Arc<dyn TransferEventSink>,
    config: ArchiveConfig,
    inner: Mutex<JobSlot>,
}

#[derive(Default)]
struct JobSlot {
    current: Option<ActiveJob>,
    next_ticket: u64,
    state: ArchiveState,
}

struct ActiveJob {
    ticket: u64,
    /// `None` until the creation request answers.
    job_id: Option<JobId>,
    stop: CancellationToken,
}

impl JobSlot {
    fn is_current(&self, ticket: u64) -> bool {
        self.current.as_ref().is_some_and(|job| job.ticket == ticket)
    }

    /// Drops the active job and records the terminal state.
    fn discard(&mut self, state: ArchiveState) {
        if let Some(job) = self.current.take() {
            job.stop.cancel();
        }
        self.state = state;
    }
}

impl ArchiveJobController {
    pub fn new(
        server: Arc<dyn FileServer>,
        sink: Arc<dyn TransferEventSink>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            server,
            sink,
            config,
            inner: Mutex::new(JobSlot::default()),
        }
    }

    pub async fn state(&self) -> ArchiveState {
        self.inner.lock().await.state
    }

    /// Id of the job being polled, if any.
    pub async fn job_id(&self) -> Option<JobId> {
        let slot = self.inner.lock().await;
        slot.current.as_ref().and_then(|job| job.job_id.clone())
    }

    /// Shorthand for archiving a single remote folder.
    pub async fn request_archive(&self, folder: &str) -> Result<ArchiveOutcome, SessionError> {
        self.run(ArchiveTarget::Folder(folder.to_string())).await
    }

    /// Creates an archive job for `target` and polls it to the end.
    ///
    /// Fails with [`SessionError::JobAlreadyActive`] if another job is still
    /// running on this controller. Server failures are reported through the
    /// sink and returned as [`ArchiveOutcome::Failed`].
    pub async fn run(&self, target: ArchiveTarget) -> Result<ArchiveOutcome, SessionError> {
        let (ticket, stop) = {
            let mut slot = self.inner.lock().await;
            if slot.current.is_some() {
                return Err(SessionError::JobAlreadyActive);
            }
            let ticket = slot.next_ticket;
            slot.next_ticket += 1;
            let stop = CancellationToken::new();
            slot.current = Some(ActiveJob {
                ticket,
                job_id: None,
                stop: stop.clone(),
            });
            slot.state = ArchiveState::Requested;
            (ticket, stop)
        };

        info!(archive = %target.describe(), "archive requested");
        let created = self.server.create_archive(&target).await;

        let job_id = {
            let mut slot = self.inner.lock().await;
            if !slot.is_current(ticket) {
                drop(slot);
                if let Ok(job_id) = created {
                    self.cancel_orphan(&job_id).await;
                }
                return Ok(ArchiveOutcome::Cancelled);
            }
            match created {
                Ok(job_id) => {
                    if let Some(job) = slot.current.as_mut() {
                        job.job_id = Some(job_id.clone());
                    }
                    slot.state = ArchiveState::Polling;
                    job_id
                }
                Err(e) => {
                    let message = format!("failed to start archive: {e}");
                    warn!(archive = %target.describe(), error = %e, "archive request failed");
                    slot.discard(ArchiveState::Failed);
                    self.sink.on_failed(&message);
                    return Ok(ArchiveOutcome::Failed(message));
                }
            }
        };
        debug!(job = %job_id, "archive job created");

        let period = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(ArchiveOutcome::Cancelled),
                _ = ticker.tick() => {}
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = stop.cancelled() => return Ok(ArchiveOutcome::Cancelled),
                result = self.server.archive_progress(&job_id) => result,
            };
            if let PollStep::Stop(outcome) = self.on_poll_result(ticket, &job_id, result).await {
                return Ok(outcome);
            }

            if self.config.max_poll_attempts.is_some_and(|max| attempts >= max) {
                return Ok(self.give_up(ticket, &job_id, attempts).await);
            }
        }
    }

    /// Applies one poll result to the job identified by `ticket`.
    pub(crate) async fn on_poll_result(
        &self,
        ticket: u64,
        job_id: &JobId,
        result: Result<i32, SessionError>,
    ) -> PollStep {
        let mut slot = self.inner.lock().await;
        if !slot.is_current(ticket) {
            debug!(job = %job_id, "ignoring poll result for inactive job");
            return PollStep::Stop(ArchiveOutcome::Cancelled);
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                let message = format!("archive progress unavailable: {e}");
                warn!(job = %job_id, error = %e, "progress query failed");
                slot.discard(ArchiveState::Failed);
                self.sink.on_failed(&message);
                return PollStep::Stop(ArchiveOutcome::Failed(message));
            }
        };

        match ProgressReading::from_raw(raw) {
            ProgressReading::Running(percent) => {
                debug!(job = %job_id, percent, "archive progress");
                self.sink.on_progress(f64::from(percent));
                PollStep::Continue
            }
            ProgressReading::Failed => {
                let message = "archive creation failed on the server".to_string();
                warn!(job = %job_id, progress = raw, "archive job failed");
                slot.discard(ArchiveState::Failed);
                self.sink.on_failed(&message);
                PollStep::Stop(ArchiveOutcome::Failed(message))
            }
            ProgressReading::Ready => {
                slot.state = ArchiveState::Ready;
                match self.server.archive_url(job_id) {
                    Ok(url) => {
                        info!(job = %job_id, url = %url, "archive ready");
                        slot.discard(ArchiveState::Downloading);
                        self.sink.on_ready_for_download(job_id, &url);
                        PollStep::Stop(ArchiveOutcome::Ready {
                            job_id: job_id.clone(),
                            url,
                        })
                    }
                    Err(e) => {
                        let message = format!("archive ready but not reachable: {e}");
                        slot.discard(ArchiveState::Failed);
                        self.sink.on_failed(&message);
                        PollStep::Stop(ArchiveOutcome::Failed(message))
                    }
                }
            }
        }
    }

    /// Stops the active job, if any.
    ///
    /// Polling stops and `on_cancelled` fires immediately; the server is then
    /// asked to stop the job. The server's answer is only logged.
    pub async fn cancel(&self) {
        let job_id = {
            let mut slot = self.inner.lock().await;
            let Some(job) = slot.current.take() else {
                return;
            };
            job.stop.cancel();
            slot.state = ArchiveState::Cancelled;
            self.sink.on_cancelled();
            job.job_id
        };

        match job_id {
            Some(job_id) => {
                info!(job = %job_id, "archive cancelled");
                match self.server.cancel_archive(&job_id).await {
                    Ok(text) => debug!(job = %job_id, response = %text, "server acknowledged cancel"),
                    Err(e) => warn!(job = %job_id, error = %e, "cancel request failed"),
                }
            }
            None => info!("archive cancelled before the server assigned a job"),
        }
    }

    /// Cancels a job that was created after the caller already gave up on it.
    async fn cancel_orphan(&self, job_id: &JobId) {
        info!(job = %job_id, "cancelling job created after cancel");
        if let Err(e) = self.server.cancel_archive(job_id).await {
            warn!(job = %job_id, error = %e, "orphan cancel failed");
        }
    }

    async fn give_up(&self, ticket: u64, job_id: &JobId, attempts: u32) -> ArchiveOutcome {
        let mut slot = self.inner.lock().await;
        if !slot.is_current(ticket) {
            return ArchiveOutcome::Cancelled;
        }
        let message = format!("archive not ready after {attempts} progress checks");
        warn!(job = %job_id, attempts, "giving up on archive job");
        slot.discard(ArchiveState::Failed);
        self.sink.on_failed(&message);
        ArchiveOutcome::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{ChannelSink, SessionEvent};
    use crate::testing::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Sleeps in small steps until `cond` holds; paused time keeps this fast.
    async fn until(cond: impl Fn() -> bool) {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn controller(
        server: MockFileServer,
        config: ArchiveConfig,
    ) -> (
        Arc<ArchiveJobController>,
        Arc<MockFileServer>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let server = Arc::new(server);
        let (sink, events) = ChannelSink::new();
        let dyn_server: Arc<dyn FileServer> = server.clone();
        let controller = Arc::new(ArchiveJobController::new(
            dyn_server,
            Arc::new(sink),
            config,
        ));
        (controller, server, events)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_ready() {
        let mock = MockFileServer::new().with_job("j-1", &[10, 45, 80, 100]);
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let outcome = controller.request_archive("/photos").await.unwrap();

        let url = "http://nas.test/download-zip-file?job_id=j-1".to_string();
        assert_eq!(
            outcome,
            ArchiveOutcome::Ready {
                job_id: JobId::new("j-1"),
                url: url.clone()
            }
        );
        assert_eq!(
            drain(&mut events),
            vec![
                SessionEvent::Progress(10.0),
                SessionEvent::Progress(45.0),
                SessionEvent::Progress(80.0),
                SessionEvent::ReadyForDownload {
                    job_id: JobId::new("j-1"),
                    url
                },
            ]
        );
        assert_eq!(server.poll_count(), 4);
        assert_eq!(controller.state().await, ArchiveState::Downloading);
        assert!(controller.job_id().await.is_none());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(server.poll_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_the_configured_interval() {
        let mock = MockFileServer::new().with_job("j", &[50, 100]);
        let (controller, _server, _events) = controller(mock, ArchiveConfig::default());

        let started = Instant::now();
        controller.request_archive("/x").await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn negative_progress_fails_once() {
        let mock = MockFileServer::new().with_job("j-2", &[20, -1, 50]);
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let outcome = controller.request_archive("/docs").await.unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Failed(_)));

        let events = drain(&mut events);
        assert_eq!(events[0], SessionEvent::Progress(20.0));
        assert_eq!(terminal_count(&events), 1);
        assert!(matches!(events.last(), Some(SessionEvent::Failed(_))));
        assert_eq!(server.poll_count(), 2);
        assert_eq!(controller.state().await, ArchiveState::Failed);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(server.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_error_is_fatal() {
        let mock = MockFileServer::new().with_job("j", &[5]);
        mock.push_poll_error("connection refused");
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let outcome = controller.request_archive("/docs").await.unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Failed(ref m) if m.contains("connection refused")));
        assert_eq!(server.poll_count(), 2);
        assert_eq!(terminal_count(&drain(&mut events)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_never_polls() {
        let mock = MockFileServer::new().fail_create("Folder not found");
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let outcome = controller.request_archive("/missing").await.unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Failed(ref m) if m.contains("Folder not found")));
        assert_eq!(server.poll_count(), 0);
        assert_eq!(terminal_count(&drain(&mut events)), 1);
        assert_eq!(controller.state().await, ArchiveState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_then_stale_poll_is_silent() {
        let (mock, gate) = MockFileServer::new().with_job("j-3", &[30, 60]).gated();
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let runner = Arc::clone(&controller);
        let run = tokio::spawn(async move { runner.request_archive("/big").await });

        // Let creation and the first poll through.
        until(|| !server.creates.lock().unwrap().is_empty()).await;
        gate.notify_one();
        until(|| server.poll_count() == 1).await;
        gate.notify_one();
        wait_for(&mut events, |e| *e == SessionEvent::Progress(30.0)).await;

        // Second poll is now parked on the gate.
        until(|| server.poll_count() == 2).await;
        controller.cancel().await;
        assert_eq!(drain(&mut events), vec![SessionEvent::Cancelled]);

        gate.notify_one();
        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, ArchiveOutcome::Cancelled);
        assert!(drain(&mut events).is_empty());
        assert_eq!(*server.cancels.lock().unwrap(), vec![JobId::new("j-3")]);
        assert_eq!(controller.state().await, ArchiveState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_while_poll_is_unanswered() {
        let (mock, gate) = MockFileServer::new().with_job("slow", &[10]).gated();
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let runner = Arc::clone(&controller);
        let run = tokio::spawn(async move { runner.request_archive("/big").await });
        until(|| !server.creates.lock().unwrap().is_empty()).await;
        gate.notify_one();

        // The first poll parks on the gate and is never released.
        until(|| server.poll_count() == 1).await;
        controller.cancel().await;

        let outcome = tokio::time::timeout(Duration::from_secs(3600), run)
            .await
            .expect("run still blocked after cancel")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, ArchiveOutcome::Cancelled);
        assert_eq!(drain(&mut events), vec![SessionEvent::Cancelled]);
        assert_eq!(*server.cancels.lock().unwrap(), vec![JobId::new("slow")]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_creation_cancels_orphan() {
        let (mock, gate) = MockFileServer::new().with_job("late", &[10]).gated();
        let (controller, server, mut events) = controller(mock, ArchiveConfig::default());

        let runner = Arc::clone(&controller);
        let run = tokio::spawn(async move { runner.request_archive("/big").await });
        until(|| !server.creates.lock().unwrap().is_empty()).await;

        controller.cancel().await;
        assert!(server.cancels.lock().unwrap().is_empty());

        gate.notify_one();
        assert_eq!(run.await.unwrap().unwrap(), ArchiveOutcome::Cancelled);
        assert_eq!(*server.cancels.lock().unwrap(), vec![JobId::new("late")]);
        assert_eq!(server.poll_count(), 0);
        assert_eq!(drain(&mut events), vec![SessionEvent::Cancelled]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_job_is_noop() {
        let (controller, server, mut events) =
            controller(MockFileServer::new(), ArchiveConfig::default());
        controller.cancel().await;
        assert!(drain(&mut events).is_empty());
        assert!(server.cancels.lock().unwrap().is_empty());
        assert_eq!(controller.state().await, ArchiveState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn max_attempts_bounds_polling() {
        let mock = MockFileServer::new().with_job("j", &[1, 2, 3, 4, 5]);
        let config = ArchiveConfig {
            max_poll_attempts: Some(3),
            ..ArchiveConfig::default()
        };
        let (controller, server, mut events) = controller(mock, config);

        let outcome = controller.request_archive("/x").await.unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Failed(ref m) if m.contains("3 progress checks")));
        assert_eq!(server.poll_count(), 3);

        let events = drain(&mut events);
        assert_eq!(progress_values(&events), vec![1.0, 2.0, 3.0]);
        assert_eq!(terminal_count(&events), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_target_is_forwarded() {
        let mock = MockFileServer::new().with_job("bulk", &[100]);
        let (controller, server, _events) = controller(mock, ArchiveConfig::default());

        let target = ArchiveTarget::Paths(vec!["/a".into(), "/b/c.txt".into()]);
        controller.run(target.clone()).await.unwrap();
        assert_eq!(*server.creates.lock().unwrap(), vec![target]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_while_active_is_rejected() {
        let (mock, gate) = MockFileServer::new().with_job("j", &[100]).gated();
        let (controller, server, _events) = controller(mock, ArchiveConfig::default());

        let runner = Arc::clone(&controller);
        let run = tokio::spawn(async move { runner.request_archive("/one").await });
        until(|| !server.creates.lock().unwrap().is_empty()).await;

        let second = controller.request_archive("/two").await;
        assert!(matches!(second, Err(SessionError::JobAlreadyActive)));

        gate.notify_one();
        gate.notify_one();
        assert!(matches!(
            run.await.unwrap().unwrap(),
            ArchiveOutcome::Ready { .. }
        ));
    }

    #[tokio::test]
    async fn stale_ticket_is_ignored() {
        let (controller, _server, mut events) =
            controller(MockFileServer::new(), ArchiveConfig::default());
        let step = controller
            .on_poll_result(7, &JobId::new("old"), Ok(50))
            .await;
        assert_eq!(step, PollStep::Stop(ArchiveOutcome::Cancelled));
        assert!(drain(&mut events).is_empty());
    }
}
