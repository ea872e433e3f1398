//! Shared test utilities for the imageflip test suite.
//!
//! Provides in-memory fixtures, archive inspection, and test doubles for the
//! three pluggable seams (codec, runner, download sink).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let sink = RecordingSink::new();
//! let files = vec![memory_file("a.avif"), memory_file("b.png")];
//! // ... run a conversion delivering into `sink.clone()` ...
//! assert_eq!(sink.saved()[0].file_name, "converted_images.zip");
//! ```

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::codec::{CodecError, CodecPort};
use crate::download::{DownloadError, DownloadSink};
use crate::runner::{JobHandle, RunnerError, TaskRunner};
use crate::types::{Direction, PendingFile};
use crate::worker::WorkerJob;

// =========================================================================
// Fixtures
// =========================================================================

/// In-memory pending file whose content is `content of <name>`.
pub fn memory_file(name: &str) -> PendingFile {
    PendingFile::from_bytes(name, format!("content of {name}").into_bytes())
}

/// Every `(entry name, contents)` pair of a ZIP archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut entry = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).unwrap();
            (entry.name().to_string(), contents)
        })
        .collect()
}

// =========================================================================
// Test doubles
// =========================================================================

/// One recorded save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Sink that records saves instead of writing them. Clones share state, so
/// a test can keep one clone and hand the other to a dispatcher.
/// Uses Mutex (not RefCell) so it is Send like real sinks.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    saved: Arc<Mutex<Vec<SavedFile>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every save until `set_failing(false)`.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<SavedFile> {
        self.saved.lock().unwrap().clone()
    }
}

impl DownloadSink for RecordingSink {
    fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DownloadError::TriggerFailed {
                name: file_name.to_string(),
                reason: "blocked by test".to_string(),
            });
        }
        self.saved.lock().unwrap().push(SavedFile {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

/// Passthrough codec that fails for one specific source name.
#[derive(Debug, Clone)]
pub struct FailingCodec {
    fail_on: String,
}

impl FailingCodec {
    pub fn on(name: &str) -> Self {
        Self {
            fail_on: name.to_string(),
        }
    }
}

impl CodecPort for FailingCodec {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn transform(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        _direction: Direction,
    ) -> Result<Vec<u8>, CodecError> {
        if source_name == self.fail_on {
            return Err(CodecError::Decode {
                name: source_name.to_string(),
                reason: "corrupt test data".to_string(),
            });
        }
        Ok(bytes)
    }
}

/// Passthrough codec that counts how many files it has transformed.
#[derive(Debug, Default)]
pub struct CountingCodec {
    transformed: AtomicUsize,
}

impl CountingCodec {
    pub fn count(&self) -> usize {
        self.transformed.load(Ordering::SeqCst)
    }
}

impl CodecPort for CountingCodec {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn transform(
        &self,
        bytes: Vec<u8>,
        _source_name: &str,
        _direction: Direction,
    ) -> Result<Vec<u8>, CodecError> {
        self.transformed.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

/// Runner whose background thread can never be created.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRunner;

impl TaskRunner for UnavailableRunner {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn dispatch(
        &self,
        _job: WorkerJob,
        _codec: Arc<dyn CodecPort>,
    ) -> Result<JobHandle, RunnerError> {
        Err(RunnerError::WorkerUnavailable(std::io::Error::other(
            "threads disabled",
        )))
    }
}
