//! The conversion worker: one request in, a stream of messages out.
//!
//! ## Algorithm
//!
//! ```text
//! step (converting):  next group of 3 files, in order
//!     read bytes → CodecPort::transform          (parallel under Schedule::Parallel)
//!     emit Progress after each file               (always in file order)
//! single → SingleArtifact  (stem + target extension, target MIME)
//! batch  → step (packaging): next group of 3 entries into the archive
//! emit final Progress (100%) then Success
//! ```
//!
//! [`WorkerTask`] does one group per [`WorkerTask::step`] and then returns,
//! so a caller on its own thread can interleave other work between groups.
//! [`execute`] simply steps a task to completion.
//!
//! The progress event for the last file is held back until the artifact
//! has been built, so a request only ever reaches 100% when it succeeds.
//! Any failure (read, transform, packaging) ends the request with a single
//! [`WorkerMessage::Error`]; no partial artifact is ever emitted.
//!
//! ## Message protocol
//!
//! Inbound: [`WorkerJob`] `{ kind: single|batch, files, direction }`.
//! Outbound: [`WorkerMessage`] `progress | success | error`. The terminal
//! message is always last.

use crate::codec::{CodecError, CodecPort};
use crate::naming::output_name;
use crate::packager::{ArchiveBuilder, DEFAULT_ARCHIVE_LIMIT, PACK_GROUP_SIZE, PackError};
use crate::types::{
    Artifact, ConversionRequest, Direction, PendingFile, ProgressTracker, SingleArtifact,
};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to read {name}: {source}")]
    ReadFailure {
        name: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Failed to package archive: {0}")]
    Packaging(#[from] PackError),
    #[error("No files to convert")]
    EmptyJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Single,
    Batch,
}

/// Message sent to the worker to start a request.
#[derive(Debug, Clone)]
pub struct WorkerJob {
    pub kind: RequestKind,
    pub files: Vec<PendingFile>,
    pub direction: Direction,
    /// Byte ceiling for the archive of a batch.
    pub archive_limit: u64,
}

impl From<&ConversionRequest> for WorkerJob {
    fn from(request: &ConversionRequest) -> Self {
        let files = request.files().to_vec();
        Self {
            kind: if files.len() == 1 {
                RequestKind::Single
            } else {
                RequestKind::Batch
            },
            files,
            direction: request.direction(),
            archive_limit: DEFAULT_ARCHIVE_LIMIT,
        }
    }
}

/// Message sent back from the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// `file_index` is the 1-based position of the file just finished.
    Progress { file_index: usize, percent: u8 },
    Success(Artifact),
    Error { message: String },
}

impl WorkerMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkerMessage::Progress { .. })
    }
}

/// How the files of one group are transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// In parallel on the rayon pool.
    Parallel,
    /// One after another on the calling thread.
    Sequential,
}

enum Phase {
    Converting,
    Packaging(ArchiveBuilder),
    Finished,
}

/// A job in progress. Each [`step`](Self::step) handles one group.
pub struct WorkerTask {
    kind: RequestKind,
    files: Vec<PendingFile>,
    direction: Direction,
    archive_limit: u64,
    codec: Arc<dyn CodecPort>,
    schedule: Schedule,
    tracker: ProgressTracker,
    /// Converted bytes in file order; drained while packaging.
    converted: Vec<Vec<u8>>,
    phase: Phase,
}

impl WorkerTask {
    pub fn new(job: WorkerJob, codec: Arc<dyn CodecPort>, schedule: Schedule) -> Self {
        debug_assert_eq!(
            job.kind == RequestKind::Single,
            job.files.len() == 1,
            "request kind must match the file count"
        );
        debug!(
            files = job.files.len(),
            kind = ?job.kind,
            direction = %job.direction,
            codec = codec.name(),
            ?schedule,
            "worker started"
        );
        Self {
            kind: job.kind,
            tracker: ProgressTracker::new(job.files.len()),
            converted: Vec::with_capacity(job.files.len()),
            files: job.files,
            direction: job.direction,
            archive_limit: job.archive_limit,
            codec,
            schedule,
            phase: Phase::Converting,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    /// Files transformed so far.
    pub fn converted_count(&self) -> usize {
        self.tracker.current().completed_count
    }

    /// Advance by one group, reporting through `emit`. Returns `true` once
    /// the terminal message has been emitted.
    pub fn step(&mut self, emit: &mut impl FnMut(WorkerMessage)) -> bool {
        let outcome = match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Finished => return true,
            Phase::Converting => self.convert_group(&mut *emit),
            Phase::Packaging(builder) => self.package_group(builder),
        };
        match outcome {
            Ok(None) => false,
            Ok(Some(artifact)) => {
                debug!(
                    name = artifact.suggested_name(),
                    size = artifact.bytes().len(),
                    "artifact ready"
                );
                emit(WorkerMessage::Progress {
                    file_index: self.files.len(),
                    percent: 100,
                });
                emit(WorkerMessage::Success(artifact));
                true
            }
            Err(e) => {
                warn!(error = %e, "conversion failed");
                emit(WorkerMessage::Error {
                    message: e.to_string(),
                });
                true
            }
        }
    }

    fn convert_group(
        &mut self,
        emit: &mut impl FnMut(WorkerMessage),
    ) -> Result<Option<Artifact>, WorkerError> {
        if self.files.is_empty() {
            return Err(WorkerError::EmptyJob);
        }
        let start = self.converted.len();
        let end = (start + PACK_GROUP_SIZE).min(self.files.len());
        let group = &self.files[start..end];
        let codec = self.codec.as_ref();
        let direction = self.direction;

        let outputs: Vec<Result<Vec<u8>, WorkerError>> = match self.schedule {
            Schedule::Parallel => group
                .par_iter()
                .map(|file| convert_file(file, codec, direction))
                .collect(),
            Schedule::Sequential => group
                .iter()
                .map(|file| convert_file(file, codec, direction))
                .collect(),
        };
        for output in outputs {
            let bytes = output?;
            let event = self.tracker.advance();
            if !self.tracker.is_complete() {
                emit(WorkerMessage::Progress {
                    file_index: event.completed_count,
                    percent: event.percent,
                });
            }
            self.converted.push(bytes);
        }

        if !self.tracker.is_complete() {
            self.phase = Phase::Converting;
            return Ok(None);
        }
        match self.kind {
            RequestKind::Single => {
                let (Some(file), Some(bytes)) = (self.files.first(), self.converted.pop()) else {
                    return Err(WorkerError::EmptyJob);
                };
                Ok(Some(Artifact::Single(SingleArtifact {
                    bytes,
                    suggested_name: output_name(&file.name, self.direction),
                    mime_type: self.direction.target_mime().to_string(),
                })))
            }
            RequestKind::Batch => {
                let builder = ArchiveBuilder::new(
                    self.files.iter().map(|f| f.name.as_str()),
                    self.direction,
                    self.archive_limit,
                )?;
                self.phase = Phase::Packaging(builder);
                Ok(None)
            }
        }
    }

    fn package_group(
        &mut self,
        mut builder: ArchiveBuilder,
    ) -> Result<Option<Artifact>, WorkerError> {
        let take = PACK_GROUP_SIZE.min(self.converted.len());
        for bytes in self.converted.drain(..take) {
            builder.add(&bytes)?;
        }
        if builder.remaining() > 0 {
            self.phase = Phase::Packaging(builder);
            return Ok(None);
        }
        Ok(Some(Artifact::Archive(builder.finish()?)))
    }
}

fn convert_file(
    file: &PendingFile,
    codec: &dyn CodecPort,
    direction: Direction,
) -> Result<Vec<u8>, WorkerError> {
    let bytes = file
        .read_bytes()
        .map_err(|source| WorkerError::ReadFailure {
            name: file.name.clone(),
            source,
        })?;
    Ok(codec.transform(bytes, &file.name, direction)?)
}

/// Run one job to completion, reporting through `emit`.
///
/// Always emits exactly one terminal message, after all progress messages.
pub fn execute(
    job: WorkerJob,
    codec: Arc<dyn CodecPort>,
    schedule: Schedule,
    mut emit: impl FnMut(WorkerMessage),
) {
    let mut task = WorkerTask::new(job, codec, schedule);
    while !task.step(&mut emit) {}
}
