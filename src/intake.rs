//! File intake: the pending batch the user is about to convert.
//!
//! Intake only filters and stages; it never reads file contents. The
//! orchestrator owns the status and asks intake whether the batch is empty.

use crate::naming::is_accepted;
use crate::types::PendingFile;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Please select image files (AVIF, PNG, JPG): {rejected} file(s) not recognized")]
    InvalidInput { rejected: usize },
}

/// The staged batch.
#[derive(Debug, Default, Clone)]
pub struct FileIntake {
    files: Vec<PendingFile>,
}

impl FileIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the batch with the accepted subset of `raw_files`.
    ///
    /// Returns the number of accepted files. When nothing is accepted the
    /// existing batch is left untouched.
    pub fn accept(&mut self, raw_files: Vec<PendingFile>) -> Result<usize, IntakeError> {
        let offered = raw_files.len();
        let accepted: Vec<PendingFile> = raw_files
            .into_iter()
            .filter(|f| is_accepted(&f.name))
            .collect();
        if accepted.is_empty() {
            return Err(IntakeError::InvalidInput { rejected: offered });
        }
        debug!(
            accepted = accepted.len(),
            skipped = offered - accepted.len(),
            "batch staged"
        );
        self.files = accepted;
        Ok(self.files.len())
    }

    /// Remove one file by position. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<PendingFile> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
