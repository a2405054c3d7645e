//! Shared mocks for session tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use nasferry_protocol::JobId;
use nasferry_transfer::{TransferTask, UploadRequest};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::server::{FileServer, ProgressFn, ServerFuture};
use crate::sink::SessionEvent;
use crate::types::ArchiveTarget;

/// How the mock answers an upload.
#[derive(Clone)]
pub enum UploadScript {
    /// Reports progress in quarters, then succeeds.
    Succeed,
    /// Reports half the bytes, then fails with the message.
    Fail(String),
    /// Reports half the bytes, then never finishes.
    Hang,
}

pub struct MockFileServer {
    scripts: Mutex<HashMap<String, UploadScript>>,
    /// "start x" / "end x" entries in call order.
    pub log: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    create_result: Mutex<Option<Result<JobId, String>>>,
    pub creates: Mutex<Vec<ArchiveTarget>>,
    progress: Mutex<VecDeque<Result<i32, String>>>,
    pub polls: Mutex<u32>,
    pub cancels: Mutex<Vec<JobId>>,
    /// When set, progress queries and job creation wait for a permit.
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl MockFileServer {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            create_result: Mutex::new(None),
            creates: Mutex::new(Vec::new()),
            progress: Mutex::new(VecDeque::new()),
            polls: Mutex::new(0),
            cancels: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn script(&self, file_name: &str, script: UploadScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(file_name.to_string(), script);
    }

    pub fn with_job(self, job_id: &str, progress: &[i32]) -> Self {
        *self.create_result.lock().unwrap() = Some(Ok(JobId::new(job_id)));
        self.progress
            .lock()
            .unwrap()
            .extend(progress.iter().map(|p| Ok(*p)));
        self
    }

    pub fn fail_create(self, message: &str) -> Self {
        *self.create_result.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn push_poll_error(&self, message: &str) {
        self.progress
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn gated(self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn started(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix("start ").map(str::to_string))
            .collect()
    }

    pub fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap()
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

impl FileServer for MockFileServer {
    fn upload(
        &self,
        request: UploadRequest,
        on_progress: ProgressFn,
        _cancel: CancellationToken,
    ) -> ServerFuture<'_, ()> {
        Box::pin(async move {
            let name = request.file_name.clone();
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get(&name)
                .cloned()
                .unwrap_or(UploadScript::Succeed);
            self.log.lock().unwrap().push(format!("start {name}"));
            let total = request.total_bytes;

            match script {
                UploadScript::Succeed => {
                    for quarter in 1..=4 {
                        on_progress(total * quarter / 4);
                        tokio::task::yield_now().await;
                    }
                    self.log.lock().unwrap().push(format!("end {name}"));
                    Ok(())
                }
                UploadScript::Fail(message) => {
                    on_progress(total / 2);
                    tokio::task::yield_now().await;
                    self.log.lock().unwrap().push(format!("end {name}"));
                    Err(SessionError::Transport(message))
                }
                UploadScript::Hang => {
                    on_progress(total / 2);
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        })
    }

    fn delete(&self, remote_path: &str) -> ServerFuture<'_, ()> {
        let remote_path = remote_path.to_string();
        Box::pin(async move {
            self.deletes.lock().unwrap().push(remote_path);
            Ok(())
        })
    }

    fn create_archive(&self, target: &ArchiveTarget) -> ServerFuture<'_, JobId> {
        let target = target.clone();
        Box::pin(async move {
            self.creates.lock().unwrap().push(target);
            self.wait_gate().await;
            match self.create_result.lock().unwrap().clone() {
                Some(Ok(job_id)) => Ok(job_id),
                Some(Err(message)) => Err(SessionError::Transport(message)),
                None => Err(SessionError::Transport("no job scripted".into())),
            }
        })
    }

    fn archive_progress(&self, _job_id: &JobId) -> ServerFuture<'_, i32> {
        Box::pin(async move {
            *self.polls.lock().unwrap() += 1;
            self.wait_gate().await;
            let next = self.progress.lock().unwrap().pop_front();
            match next {
                Some(Ok(progress)) => Ok(progress),
                Some(Err(message)) => Err(SessionError::Transport(message)),
                None => Err(SessionError::Transport("Job not found".into())),
            }
        })
    }

    fn cancel_archive(&self, job_id: &JobId) -> ServerFuture<'_, String> {
        let job_id = job_id.clone();
        Box::pin(async move {
            self.cancels.lock().unwrap().push(job_id);
            Ok("Cancelled".to_string())
        })
    }

    fn archive_url(&self, job_id: &JobId) -> Result<String, SessionError> {
        Ok(format!("http://nas.test/download-zip-file?job_id={job_id}"))
    }
}

pub fn memory_task(name: &str, size: usize) -> TransferTask {
    TransferTask::from_bytes(vec![0u8; size], "/inbox", name)
}

/// Drains everything the sink has emitted so far.
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Waits until an event matching `pred` arrives. Returns everything seen.
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let hit = pred(&event);
        seen.push(event);
        if hit {
            return seen;
        }
    }
    panic!("event stream closed; saw {seen:?}");
}

pub fn progress_values(events: &[SessionEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

pub fn terminal_count(events: &[SessionEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}
