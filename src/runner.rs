//! Where the worker runs: a background thread or the caller's thread.
//!
//! Both runners drive the same [`WorkerTask`] algorithm and produce the same
//! messages. They differ only in who advances the task:
//!
//! | Runner | Placement | Within a group | Between groups |
//! |---|---|---|---|
//! | [`ThreadedRunner`] | named background thread | parallel (rayon) | runs on |
//! | [`ChunkedRunner`] | caller's thread | sequential | returns to the caller |
//!
//! A threaded job hands back a channel. A chunked job does no work at
//! dispatch; it is handed back as a [`JobHandle::Stepped`] task and the
//! caller advances it one group per [`WorkerTask::step`].
//!
//! The runner is chosen once from [`Capabilities`](crate::capability::Capabilities).
//! If spawning the background thread fails at dispatch time, the
//! orchestrator falls back to the chunked runner without surfacing an error.

use crate::capability::Capabilities;
use crate::codec::CodecPort;
use crate::worker::{self, Schedule, WorkerJob, WorkerMessage, WorkerTask};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Background worker unavailable: {0}")]
    WorkerUnavailable(#[source] std::io::Error),
}

/// A dispatched job.
pub enum JobHandle {
    /// Running elsewhere; messages arrive on the channel.
    Detached(Receiver<WorkerMessage>),
    /// Runs only while the holder calls [`WorkerTask::step`].
    Stepped(WorkerTask),
}

/// Starts worker jobs.
pub trait TaskRunner: Send {
    /// Short identifier shown in logs and `probe` output.
    fn name(&self) -> &'static str;

    /// Start `job`. An `Err` means the job was not started.
    fn dispatch(&self, job: WorkerJob, codec: Arc<dyn CodecPort>)
    -> Result<JobHandle, RunnerError>;
}

/// Runs each job on its own background thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadedRunner;

impl TaskRunner for ThreadedRunner {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn dispatch(
        &self,
        job: WorkerJob,
        codec: Arc<dyn CodecPort>,
    ) -> Result<JobHandle, RunnerError> {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("imageflip-worker".to_string())
            .spawn(move || {
                worker::execute(job, codec, Schedule::Parallel, |message| {
                    // The receiver is gone once the orchestrator is dropped;
                    // the result is simply abandoned.
                    let _ = tx.send(message);
                });
            })
            .map_err(RunnerError::WorkerUnavailable)?;
        Ok(JobHandle::Detached(rx))
    }
}

/// Stages each job for cooperative, group-at-a-time execution on the
/// caller's thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkedRunner;

impl TaskRunner for ChunkedRunner {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn dispatch(
        &self,
        job: WorkerJob,
        codec: Arc<dyn CodecPort>,
    ) -> Result<JobHandle, RunnerError> {
        Ok(JobHandle::Stepped(WorkerTask::new(
            job,
            codec,
            Schedule::Sequential,
        )))
    }
}

/// Pick the runner for this session.
///
/// `allow_background` comes from `processing.background_worker` in config
/// and can only turn the threaded runner off.
pub fn select_runner(caps: &Capabilities, allow_background: bool) -> Box<dyn TaskRunner> {
    if caps.supports_background_worker && allow_background {
        debug!("using threaded runner");
        Box::new(ThreadedRunner)
    } else {
        debug!(
            supported = caps.supports_background_worker,
            allow_background, "using chunked runner"
        );
        Box::new(ChunkedRunner)
    }
}
