//! Batch packaging: many converted files → one ZIP archive.
//!
//! Entries are written in input order with names from
//! [`naming::unique_output_names`](crate::naming::unique_output_names), using
//! Deflate at a fixed medium level. [`ArchiveBuilder`] is incremental: the
//! worker adds one group of [`PACK_GROUP_SIZE`] entries per step, so a
//! cooperative runner regains control between groups. The archive is fully
//! buffered in memory and is only returned once every entry has been
//! written. Any failure aborts the whole archive.
//!
//! The buffer is capped at a byte limit; writing past it fails the archive
//! with an I/O error instead of growing without bound.
//!
//! Archives are deterministic: the `zip` crate's `time` feature is off, so
//! every entry carries the same fixed DOS timestamp.

use crate::naming::unique_output_names;
use crate::types::{ARCHIVE_NAME, ArchiveArtifact, Direction};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use thiserror::Error;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level: medium space/speed tradeoff. Not configurable.
pub const COMPRESSION_LEVEL: i32 = 6;

/// Number of inputs handled per packaging step.
pub const PACK_GROUP_SIZE: usize = 3;

/// Default archive ceiling: 2 GiB.
pub const DEFAULT_ARCHIVE_LIMIT: u64 = 2048 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error while writing {entry}: {source}")]
    Io {
        entry: String,
        source: std::io::Error,
    },
    #[error("Nothing to pack")]
    Empty,
    #[error("Archive incomplete: {written} of {expected} entries written")]
    Incomplete { written: usize, expected: usize },
}

/// In-memory archive buffer that refuses to grow past `limit` bytes.
struct BoundedBuffer {
    inner: Cursor<Vec<u8>>,
    limit: u64,
}

impl Write for BoundedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.inner.position() + buf.len() as u64;
        if end > self.limit {
            return Err(io::Error::other(format!(
                "archive exceeds {} bytes",
                self.limit
            )));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for BoundedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Writes converted files into one archive, an entry at a time.
pub struct ArchiveBuilder {
    writer: ZipWriter<BoundedBuffer>,
    options: FileOptions,
    entry_names: Vec<String>,
    written: usize,
}

impl ArchiveBuilder {
    /// Prepare an archive for the given source names (in input order).
    pub fn new<'a>(
        source_names: impl IntoIterator<Item = &'a str>,
        direction: Direction,
        limit: u64,
    ) -> Result<Self, PackError> {
        let entry_names = unique_output_names(source_names, direction);
        if entry_names.is_empty() {
            return Err(PackError::Empty);
        }
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL));
        let buffer = BoundedBuffer {
            inner: Cursor::new(Vec::new()),
            limit,
        };
        Ok(Self {
            writer: ZipWriter::new(buffer),
            options,
            entry_names,
            written: 0,
        })
    }

    /// Entries still to be written.
    pub fn remaining(&self) -> usize {
        self.entry_names.len() - self.written
    }

    /// Write the next entry's contents.
    pub fn add(&mut self, bytes: &[u8]) -> Result<(), PackError> {
        let Some(entry) = self.entry_names.get(self.written) else {
            return Err(PackError::Incomplete {
                written: self.written + 1,
                expected: self.entry_names.len(),
            });
        };
        self.writer.start_file(entry.as_str(), self.options)?;
        self.writer
            .write_all(bytes)
            .map_err(|source| PackError::Io {
                entry: entry.clone(),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    /// Close the archive. Fails unless every entry has been written.
    pub fn finish(mut self) -> Result<ArchiveArtifact, PackError> {
        if self.remaining() > 0 {
            return Err(PackError::Incomplete {
                written: self.written,
                expected: self.entry_names.len(),
            });
        }
        let bytes = self.writer.finish()?.inner.into_inner();
        debug!(
            entries = self.entry_names.len(),
            size = bytes.len(),
            "archive assembled"
        );
        Ok(ArchiveArtifact {
            bytes,
            suggested_name: ARCHIVE_NAME.to_string(),
            entry_names: self.entry_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::zip_entries;

    fn build(names: &[&str], direction: Direction, limit: u64) -> Result<ArchiveArtifact, PackError> {
        let mut builder = ArchiveBuilder::new(names.iter().copied(), direction, limit)?;
        for name in names {
            builder.add(format!("bytes of {name}").as_bytes())?;
        }
        builder.finish()
    }

    #[test]
    fn one_entry_per_input_with_swapped_extensions() {
        let archive = build(
            &["a.avif", "b.png", "c.jpg"],
            Direction::AvifToJpg,
            DEFAULT_ARCHIVE_LIMIT,
        )
        .unwrap();

        assert_eq!(archive.suggested_name, "converted_images.zip");
        assert_eq!(archive.entry_names, vec!["a.jpg", "b.jpg", "c.jpg"]);

        let entries = zip_entries(&archive.bytes);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("a.jpg".to_string(), b"bytes of a.avif".to_vec()));
        assert_eq!(entries[2].0, "c.jpg");
    }

    #[test]
    fn colliding_outputs_get_distinct_entries() {
        let archive = build(&["a.jpg", "a.jpeg"], Direction::JpgToAvif, DEFAULT_ARCHIVE_LIMIT).unwrap();
        let names: Vec<String> = zip_entries(&archive.bytes)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a.avif", "a-2.avif"]);
    }

    #[test]
    fn entry_names_never_carry_directories() {
        let archive = build(
            &["../x.avif", "nested/dir/y.avif", "..\\z.avif"],
            Direction::AvifToJpg,
            DEFAULT_ARCHIVE_LIMIT,
        )
        .unwrap();
        let names: Vec<String> = zip_entries(&archive.bytes)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["x.jpg", "y.jpg", "z.jpg"]);
    }

    #[test]
    fn remaining_counts_down() {
        let mut builder =
            ArchiveBuilder::new(["a.avif", "b.avif"], Direction::AvifToJpg, DEFAULT_ARCHIVE_LIMIT)
                .unwrap();
        assert_eq!(builder.remaining(), 2);
        builder.add(b"a").unwrap();
        assert_eq!(builder.remaining(), 1);
        builder.add(b"b").unwrap();
        assert_eq!(builder.remaining(), 0);
        assert!(matches!(
            builder.add(b"extra"),
            Err(PackError::Incomplete { .. })
        ));
    }

    #[test]
    fn unfinished_archive_is_rejected() {
        let mut builder =
            ArchiveBuilder::new(["a.avif", "b.avif"], Direction::AvifToJpg, DEFAULT_ARCHIVE_LIMIT)
                .unwrap();
        builder.add(b"a").unwrap();
        assert!(matches!(
            builder.finish(),
            Err(PackError::Incomplete {
                written: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn exceeding_the_limit_aborts_the_archive() {
        let err = build(&["a.avif", "b.avif", "c.avif"], Direction::AvifToJpg, 64).unwrap_err();
        assert!(matches!(err, PackError::Zip(_) | PackError::Io { .. }));
        assert!(err.to_string().contains("archive exceeds 64 bytes"));
    }

    #[test]
    fn archive_bytes_are_deterministic() {
        let first = build(&["a.avif", "b.avif"], Direction::AvifToJpg, DEFAULT_ARCHIVE_LIMIT).unwrap();
        let second = build(&["a.avif", "b.avif"], Direction::AvifToJpg, DEFAULT_ARCHIVE_LIMIT).unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            ArchiveBuilder::new(Vec::<&str>::new(), Direction::AvifToJpg, DEFAULT_ARCHIVE_LIMIT),
            Err(PackError::Empty)
        ));
    }
}
