//! Shared types used across the conversion pipeline.
//!
//! These flow from intake (pending files) through the worker (progress,
//! artifacts) to the orchestrator and download dispatcher, and must stay
//! identical across all of them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Fixed file name of the archive produced for multi-file batches.
pub const ARCHIVE_NAME: &str = "converted_images.zip";

/// MIME type reported for archive artifacts.
pub const ARCHIVE_MIME: &str = "application/zip";

/// Which way the format conversion runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    AvifToJpg,
    JpgToAvif,
}

impl Direction {
    /// Extension (without dot) of every file this direction produces.
    pub fn target_extension(self) -> &'static str {
        match self {
            Direction::AvifToJpg => "jpg",
            Direction::JpgToAvif => "avif",
        }
    }

    /// MIME type of every file this direction produces.
    pub fn target_mime(self) -> &'static str {
        match self {
            Direction::AvifToJpg => "image/jpeg",
            Direction::JpgToAvif => "image/avif",
        }
    }

    /// The opposite direction.
    pub fn toggled(self) -> Self {
        match self {
            Direction::AvifToJpg => Direction::JpgToAvif,
            Direction::JpgToAvif => Direction::AvifToJpg,
        }
    }

    /// Short human label, e.g. for the convert button.
    pub fn label(self) -> &'static str {
        match self {
            Direction::AvifToJpg => "AVIF \u{2192} JPG",
            Direction::JpgToAvif => "JPG \u{2192} AVIF",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AvifToJpg => f.write_str("avif-to-jpg"),
            Direction::JpgToAvif => f.write_str("jpg-to-avif"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avif-to-jpg" | "avif2jpg" | "jpg" => Ok(Direction::AvifToJpg),
            "jpg-to-avif" | "jpg2avif" | "avif" => Ok(Direction::JpgToAvif),
            other => Err(format!(
                "unknown direction '{other}' (expected avif-to-jpg or jpg-to-avif)"
            )),
        }
    }
}

/// Where a pending file's bytes live. Nothing is read until the worker asks.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

impl FileSource {
    /// Read the full contents into memory.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            FileSource::Path(path) => std::fs::read(path),
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// A file dropped or selected by the user, staged for conversion.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub byte_size: u64,
    pub mime_hint: String,
    pub source: FileSource,
}

impl PendingFile {
    /// Stage a file on disk. Only metadata is touched; the bytes are read
    /// lazily during conversion.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self {
            mime_hint: crate::naming::mime_for_name(&name).to_string(),
            name,
            byte_size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Stage an in-memory file (e.g. a blob handed over by a UI layer).
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes: Arc<[u8]> = bytes.into();
        Self {
            mime_hint: crate::naming::mime_for_name(&name).to_string(),
            byte_size: bytes.len() as u64,
            name,
            source: FileSource::Memory(bytes),
        }
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        self.source.read()
    }
}

/// One conversion run: an ordered, non-empty batch plus a direction.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    files: Vec<PendingFile>,
    direction: Direction,
}

impl ConversionRequest {
    /// Returns `None` for an empty batch.
    pub fn new(files: Vec<PendingFile>, direction: Direction) -> Option<Self> {
        if files.is_empty() {
            return None;
        }
        Some(Self { files, direction })
    }

    pub fn files(&self) -> &[PendingFile] {
        &self.files
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// A single converted file, saved as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleArtifact {
    pub bytes: Vec<u8>,
    pub suggested_name: String,
    pub mime_type: String,
}

/// A ZIP archive bundling every converted file of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub bytes: Vec<u8>,
    pub suggested_name: String,
    /// Entry names in archive order.
    pub entry_names: Vec<String>,
}

/// Successful output of the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Single(SingleArtifact),
    Archive(ArchiveArtifact),
}

impl Artifact {
    pub fn suggested_name(&self) -> &str {
        match self {
            Artifact::Single(a) => &a.suggested_name,
            Artifact::Archive(a) => &a.suggested_name,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Artifact::Single(a) => &a.bytes,
            Artifact::Archive(a) => &a.bytes,
        }
    }
}

/// Terminal outcome of a [`ConversionRequest`]. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Single(SingleArtifact),
    Archive(ArchiveArtifact),
    Failure { message: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, ConversionResult::Failure { .. })
    }

    /// One-line description for status displays.
    pub fn summary(&self) -> String {
        match self {
            ConversionResult::Single(a) => {
                format!("{} ({})", a.suggested_name, a.mime_type)
            }
            ConversionResult::Archive(a) => {
                format!("{} ({} files)", a.suggested_name, a.entry_names.len())
            }
            ConversionResult::Failure { message } => format!("failed: {message}"),
        }
    }
}

impl From<Artifact> for ConversionResult {
    fn from(artifact: Artifact) -> Self {
        match artifact {
            Artifact::Single(a) => ConversionResult::Single(a),
            Artifact::Archive(a) => ConversionResult::Archive(a),
        }
    }
}

/// Progress after one more file of a request has been converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub completed_count: usize,
    pub total_count: usize,
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(completed_count: usize, total_count: usize) -> Self {
        Self {
            completed_count,
            total_count,
            percent: percent_of(completed_count, total_count),
        }
    }
}

/// `round(completed / total * 100)`, rounding halves up. Zero when `total` is zero.
pub fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 100 + total / 2) / total) as u8
}

/// Counts completed files for one request. Never goes backwards and never
/// passes the total.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    completed: usize,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    /// Record one more completed file and return the resulting event.
    pub fn advance(&mut self) -> ProgressEvent {
        self.completed = (self.completed + 1).min(self.total);
        self.current()
    }

    pub fn current(&self) -> ProgressEvent {
        ProgressEvent::new(self.completed, self.total)
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}
