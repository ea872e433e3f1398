//! Delivering finished artifacts: one save per successful conversion.
//!
//! Platform quirks of "make the user's machine save this file" live behind
//! [`DownloadSink`]. The [`DownloadDispatcher`] decides *what* to save
//! (name, MIME type, bytes) and the sink decides *how*.
//!
//! | Result | File name | MIME type |
//! |---|---|---|
//! | Single | `suggested_name` (e.g. `a.jpg`) | target MIME, or `application/octet-stream` when forced |
//! | Archive | `converted_images.zip` | `application/zip` |
//! | Failure | — | never delivered |
//!
//! Forcing the generic binary type makes browser-like sinks save the file
//! instead of opening it inline.

use crate::types::{ARCHIVE_MIME, ConversionResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// MIME type used when `force_binary_mime` is on.
pub const BINARY_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Download of {name} failed: {reason}")]
    TriggerFailed { name: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Nothing to download: the conversion failed")]
    NoArtifact,
}

/// Platform capability that persists one file for the user.
pub trait DownloadSink: Send {
    fn save(&self, file_name: &str, mime_type: &str, bytes: &[u8]) -> Result<(), DownloadError>;
}

/// Saves downloads into a directory, like a browser's download folder.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: &Path) -> Result<Self, DownloadError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

/// A bare file name: no separators, no `..`, not empty.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

impl DownloadSink for DirectorySink {
    fn save(&self, file_name: &str, _mime_type: &str, bytes: &[u8]) -> Result<(), DownloadError> {
        if !is_plain_file_name(file_name) {
            return Err(DownloadError::TriggerFailed {
                name: file_name.to_string(),
                reason: "file name must not contain path components".to_string(),
            });
        }
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes).map_err(|e| DownloadError::TriggerFailed {
            name: file_name.to_string(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), size = bytes.len(), "saved");
        Ok(())
    }
}

/// Dispatcher settings, taken from the `[download]` config section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub force_binary_mime: bool,
    /// Pause before handing the artifact to the sink. Zero skips it.
    pub settle_delay: Duration,
}

/// What was handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub file_name: String,
    pub mime_type: String,
    pub size: usize,
}

/// Turns a successful [`ConversionResult`] into exactly one sink save.
pub struct DownloadDispatcher {
    sink: Box<dyn DownloadSink>,
    options: DownloadOptions,
}

impl DownloadDispatcher {
    pub fn new(sink: Box<dyn DownloadSink>, options: DownloadOptions) -> Self {
        Self { sink, options }
    }

    /// Deliver `result`. Failures are never delivered.
    pub fn deliver(&self, result: &ConversionResult) -> Result<Delivery, DownloadError> {
        let (file_name, mime_type, bytes) = match result {
            ConversionResult::Single(a) => {
                let mime = if self.options.force_binary_mime {
                    BINARY_MIME
                } else {
                    a.mime_type.as_str()
                };
                (a.suggested_name.as_str(), mime, a.bytes.as_slice())
            }
            ConversionResult::Archive(a) => {
                (a.suggested_name.as_str(), ARCHIVE_MIME, a.bytes.as_slice())
            }
            ConversionResult::Failure { .. } => return Err(DownloadError::NoArtifact),
        };

        if !self.options.settle_delay.is_zero() {
            std::thread::sleep(self.options.settle_delay);
        }

        debug!(file_name, mime_type, size = bytes.len(), "delivering");
        self.sink.save(file_name, mime_type, bytes)?;
        Ok(Delivery {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len(),
        })
    }
}
