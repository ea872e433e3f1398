//! # Imageflip
//!
//! A converter for dropped image files: AVIF to JPG or JPG to AVIF. One
//! input file yields one converted file; several yield a single
//! `converted_images.zip`. Either way the result is handed to a download sink
//! as soon as the job finishes.
//!
//! # Architecture: Intake, Worker, Delivery
//!
//! ```text
//! 1. Intake     dropped files   →  pending batch     (filter + stage)
//! 2. Worker     pending batch   →  artifact          (transform + package)
//! 3. Delivery   artifact        →  download sink     (save once)
//! ```
//!
//! The [`orchestrator`] owns the only mutable state. It stages drops through
//! [`intake`], hands a snapshot of the batch to a [`runner`], consumes the
//! worker's messages, and passes the finished artifact to [`download`]. The
//! worker never sees the orchestrator; it only sends messages over a channel.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`intake`] | Filters a drop to accepted extensions and stages the batch |
//! | [`capability`] | Detects whether background workers are available |
//! | [`runner`] | Runs a job on a background thread or inline in chunks |
//! | [`worker`] | Reads, transforms, and packages a batch; reports progress |
//! | [`packager`] | Incremental Deflate ZIP assembly with a size ceiling |
//! | [`codec`] | Per-file transform seam: passthrough stub or native `image` codec |
//! | [`download`] | Saves an artifact through a pluggable sink |
//! | [`orchestrator`] | State machine: idle, ready, processing, success, error |
//! | [`config`] | `imageflip.toml` loading, validation, and site profiles |
//! | [`types`] | Directions, pending files, artifacts, results, progress |
//! | [`naming`] | Extension rules, output names, file size formatting |
//! | [`output`] | CLI output formatting for batches, status events, and probes |
//!
//! # Design Decisions
//!
//! ## Progress Never Lies
//!
//! Percent is `round(completed / total * 100)`, monotone within a job. The
//! last file's progress is held back until the artifact exists, so 100% is
//! reported only for a conversion that actually succeeded.
//!
//! ## Direction Is Captured at Start
//!
//! A [`types::ConversionRequest`] is an immutable snapshot of the batch and
//! the direction. Toggling the direction mid-job cannot change what the
//! running job produces.
//!
//! ## Stub Codec by Default
//!
//! The default [`codec::PassthroughCodec`] copies bytes and only renames the
//! output. The pipeline, naming, packaging, and delivery are all real; a
//! genuine pixel transform plugs in behind [`codec::CodecPort`] without
//! touching anything else. [`codec::NativeCodec`] is one such transform.

pub mod capability;
pub mod codec;
pub mod config;
pub mod download;
pub mod intake;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod packager;
pub mod runner;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
