//! The conversion state machine and single source of truth for status.
//!
//! ```text
//!            submit_files            start_conversion
//!   Idle ───────────────▶ Ready ─────────────────▶ Processing
//!    ▲  ◀── remove_file ──┘ ▲                        │      │
//!    │      (batch empty)   │ submit_files           │      │
//!    │                      │                  success│      │failure
//!    │                      │                        ▼      ▼
//!    └──── reset_to_idle ───┴──────────────────── Success  Error
//! ```
//!
//! Inbound operations never fail loudly on misuse: starting twice,
//! starting from the wrong state, or touching the batch while a job is in
//! flight are all ignored. Only an invalid drop reports an error, and it
//! leaves the status untouched.
//!
//! A background job reports over a channel; an in-process job only runs
//! when the orchestrator steps it. [`ConversionOrchestrator::pump`] never
//! blocks: it drains what a background job has sent, or advances an
//! in-process job by one group. [`ConversionOrchestrator::wait`] keeps
//! going until the job ends. On success the
//! artifact is delivered exactly once. A failed delivery becomes a warning
//! and can be retried with [`ConversionOrchestrator::retry_download`].
//!
//! There is no cancellation: once started, a job runs to completion. Dropping
//! the orchestrator abandons its result.

use crate::capability::Capabilities;
use crate::codec::CodecPort;
use crate::config::{AppConfig, resolve_site};
use crate::download::{DownloadDispatcher, DownloadError, DownloadSink};
use crate::intake::{FileIntake, IntakeError};
use crate::packager::DEFAULT_ARCHIVE_LIMIT;
use crate::runner::{ChunkedRunner, JobHandle, TaskRunner, select_runner};
use crate::types::{ConversionRequest, ConversionResult, Direction, PendingFile};
use crate::worker::{WorkerJob, WorkerMessage, WorkerTask};
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

/// Message used when a worker disappears without a terminal message.
const WORKER_LOST: &str = "Conversion worker stopped unexpectedly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Ready,
    Processing,
    Success,
    Error,
}

/// Snapshot published on every status or progress change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub status: Status,
    pub direction: Direction,
    pub percent: u8,
    /// 1-based index of the last finished file; 0 before the first.
    pub current_file: usize,
    pub total_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct ConversionOrchestrator {
    intake: FileIntake,
    direction: Direction,
    status: Status,
    percent: u8,
    current_file: usize,
    active: Option<ConversionRequest>,
    result: Option<ConversionResult>,
    error: Option<String>,
    warning: Option<String>,
    runner: Box<dyn TaskRunner>,
    codec: Arc<dyn CodecPort>,
    dispatcher: DownloadDispatcher,
    archive_limit: u64,
    job: Option<JobHandle>,
    events: Option<Sender<StatusEvent>>,
}

impl ConversionOrchestrator {
    pub fn new(
        runner: Box<dyn TaskRunner>,
        codec: Arc<dyn CodecPort>,
        dispatcher: DownloadDispatcher,
        direction: Direction,
    ) -> Self {
        Self {
            intake: FileIntake::new(),
            direction,
            status: Status::Idle,
            percent: 0,
            current_file: 0,
            active: None,
            result: None,
            error: None,
            warning: None,
            runner,
            codec,
            dispatcher,
            archive_limit: DEFAULT_ARCHIVE_LIMIT,
            job: None,
            events: None,
        }
    }

    /// Wire everything from config: runner from capabilities, codec from
    /// `processing.codec`, direction from the resolved site profile.
    pub fn from_config(
        config: &AppConfig,
        caps: &Capabilities,
        sink: Box<dyn DownloadSink>,
    ) -> Self {
        let runner = select_runner(caps, config.processing.background_worker);
        let codec = config.processing.codec.build(config.processing.quality);
        let dispatcher = DownloadDispatcher::new(sink, config.download.options());
        let site = resolve_site(config);
        Self::new(runner, codec, dispatcher, site.default_direction)
            .with_archive_limit(config.processing.archive_limit())
    }

    /// Cap the size of batch archives, in bytes.
    pub fn with_archive_limit(mut self, bytes: u64) -> Self {
        self.archive_limit = bytes;
        self
    }

    /// Publish every status change on `events`.
    pub fn with_events(mut self, events: Sender<StatusEvent>) -> Self {
        self.events = Some(events);
        self
    }

    // =========================================================================
    // Inbound operations
    // =========================================================================

    /// Stage a new drop. Ignored while processing.
    ///
    /// On `InvalidInput` both the batch and the status are left as they were.
    pub fn submit_files(&mut self, raw_files: Vec<PendingFile>) -> Result<usize, IntakeError> {
        if self.status == Status::Processing {
            debug!("drop ignored while processing");
            return Ok(0);
        }
        let accepted = self.intake.accept(raw_files)?;
        self.clear_outcome();
        self.set_status(Status::Ready);
        Ok(accepted)
    }

    /// Change the direction used by the next `start_conversion`.
    /// Ignored while processing.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.status == Status::Processing {
            debug!("direction change ignored while processing");
            return;
        }
        if self.direction != direction {
            self.direction = direction;
            self.publish();
        }
    }

    /// Remove one pending file. An emptied batch returns to `Idle`.
    /// Ignored while processing.
    pub fn remove_file(&mut self, index: usize) -> Option<PendingFile> {
        if self.status == Status::Processing {
            debug!("remove ignored while processing");
            return None;
        }
        let removed = self.intake.remove(index)?;
        if self.intake.is_empty() {
            self.clear_outcome();
            self.set_status(Status::Idle);
        } else {
            self.publish();
        }
        Some(removed)
    }

    /// "Convert more": drop the batch and any result. Ignored while processing.
    pub fn reset_to_idle(&mut self) {
        if self.status == Status::Processing {
            debug!("reset ignored while processing");
            return;
        }
        self.intake.clear();
        self.clear_outcome();
        self.set_status(Status::Idle);
    }

    /// Start converting the pending batch. Returns whether a job was started.
    ///
    /// Only valid from `Ready`; every other state (including `Processing`)
    /// makes this a no-op.
    pub fn start_conversion(&mut self) -> bool {
        if self.status != Status::Ready {
            debug!(status = ?self.status, "start ignored");
            return false;
        }
        let Some(request) = ConversionRequest::new(self.intake.files().to_vec(), self.direction)
        else {
            return false;
        };

        let mut job = WorkerJob::from(&request);
        job.archive_limit = self.archive_limit;
        self.active = Some(request);
        self.clear_outcome();
        self.set_status(Status::Processing);
        info!(
            files = job.files.len(),
            direction = %job.direction,
            runner = self.runner.name(),
            "conversion started"
        );

        let handle = self
            .runner
            .dispatch(job.clone(), Arc::clone(&self.codec))
            .or_else(|e| {
                debug!(error = %e, "falling back to in-process conversion");
                ChunkedRunner.dispatch(job, Arc::clone(&self.codec))
            });
        match handle {
            Ok(handle) => self.job = Some(handle),
            Err(e) => self.handle(WorkerMessage::Error {
                message: e.to_string(),
            }),
        }
        true
    }

    /// Retry delivery after a failed download. Returns `Ok(false)` when there
    /// is nothing to retry.
    pub fn retry_download(&mut self) -> Result<bool, DownloadError> {
        if self.status != Status::Success || self.warning.is_none() {
            return Ok(false);
        }
        let Some(result) = self.result.as_ref() else {
            return Ok(false);
        };
        self.dispatcher.deliver(result)?;
        self.warning = None;
        self.publish();
        Ok(true)
    }

    // =========================================================================
    // Worker message handling
    // =========================================================================

    /// Make progress without blocking. Returns the number of messages handled.
    ///
    /// A background job has whatever it already sent drained. An in-process
    /// job is advanced by exactly one group.
    pub fn pump(&mut self) -> usize {
        match self.job.take() {
            None => 0,
            Some(JobHandle::Stepped(task)) => self.step_task(task),
            Some(JobHandle::Detached(rx)) => self.drain(rx),
        }
    }

    /// Block until the active job (if any) has finished. Returns the final status.
    pub fn wait(&mut self) -> Status {
        while let Some(job) = self.job.take() {
            match job {
                JobHandle::Stepped(task) => {
                    self.step_task(task);
                }
                JobHandle::Detached(rx) => match rx.recv() {
                    Ok(message) => {
                        let terminal = message.is_terminal();
                        self.handle(message);
                        if !terminal {
                            self.job = Some(JobHandle::Detached(rx));
                        }
                    }
                    Err(_) => self.handle(WorkerMessage::Error {
                        message: WORKER_LOST.to_string(),
                    }),
                },
            }
        }
        self.status
    }

    fn step_task(&mut self, mut task: WorkerTask) -> usize {
        let mut messages = Vec::new();
        let finished = task.step(&mut |m: WorkerMessage| messages.push(m));
        if !finished {
            self.job = Some(JobHandle::Stepped(task));
        }
        let handled = messages.len();
        for message in messages {
            self.handle(message);
        }
        handled
    }

    fn drain(&mut self, rx: Receiver<WorkerMessage>) -> usize {
        let mut handled = 0;
        loop {
            match rx.try_recv() {
                Ok(message) => {
                    handled += 1;
                    let terminal = message.is_terminal();
                    self.handle(message);
                    if terminal {
                        return handled;
                    }
                }
                Err(TryRecvError::Empty) => {
                    self.job = Some(JobHandle::Detached(rx));
                    return handled;
                }
                Err(TryRecvError::Disconnected) => {
                    self.handle(WorkerMessage::Error {
                        message: WORKER_LOST.to_string(),
                    });
                    return handled;
                }
            }
        }
    }

    fn handle(&mut self, message: WorkerMessage) {
        if self.status != Status::Processing {
            return;
        }
        match message {
            WorkerMessage::Progress {
                file_index,
                percent,
            } => {
                if file_index < self.current_file {
                    return;
                }
                self.current_file = file_index;
                self.percent = percent;
                self.publish();
            }
            WorkerMessage::Success(artifact) => {
                let result = ConversionResult::from(artifact);
                info!(result = %result.summary(), "conversion finished");
                if let Some(request) = self.active.as_ref() {
                    self.current_file = request.files().len();
                }
                self.percent = 100;
                self.job = None;
                self.active = None;
                if let Err(e) = self.dispatcher.deliver(&result) {
                    warn!(error = %e, "download failed; result kept for retry");
                    self.warning = Some(e.to_string());
                }
                self.result = Some(result);
                self.set_status(Status::Success);
            }
            WorkerMessage::Error { message } => {
                self.job = None;
                self.active = None;
                self.error = Some(message.clone());
                self.result = Some(ConversionResult::Failure { message });
                self.set_status(Status::Error);
            }
        }
    }

    // =========================================================================
    // State
    // =========================================================================

    fn clear_outcome(&mut self) {
        self.percent = 0;
        self.current_file = 0;
        self.result = None;
        self.error = None;
        self.warning = None;
    }

    fn set_status(&mut self, status: Status) {
        self.status = status;
        self.publish();
    }

    fn publish(&self) {
        if let Some(events) = &self.events {
            let _ = events.send(self.snapshot());
        }
    }

    pub fn snapshot(&self) -> StatusEvent {
        StatusEvent {
            status: self.status,
            direction: self.direction,
            percent: self.percent,
            current_file: self.current_file,
            total_files: self
                .active
                .as_ref()
                .map(|r| r.files().len())
                .unwrap_or_else(|| self.intake.len()),
            error: self.error.clone(),
            result: self.result.as_ref().map(ConversionResult::summary),
            warning: self.warning.clone(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn files(&self) -> &[PendingFile] {
        self.intake.files()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn current_file(&self) -> usize {
        self.current_file
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }

    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }
}
