//! The codec boundary: where per-file format transformation plugs in.
//!
//! The worker never touches pixels itself. For every file it calls
//! [`CodecPort::transform`] with the raw bytes and the conversion
//! direction, and packages whatever comes back.
//!
//! | Codec | Behaviour |
//! |---|---|
//! | [`PassthroughCodec`] | Bytes unchanged; only the output name and MIME type change. Default. |
//! | [`NativeCodec`] | Decodes JPEG/PNG with the `image` crate and re-encodes to JPEG or AVIF (rav1e). |
//!
//! AVIF *decoding* is not compiled in: the `image` crate's `"avif"` feature
//! only ships the encoder, so [`NativeCodec`] rejects AVIF sources that need
//! re-encoding with [`CodecError::Unsupported`].

pub mod native;

use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub use native::NativeCodec;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unsupported conversion: {0}")]
    Unsupported(String),
    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },
    #[error("Failed to encode {name}: {reason}")]
    Encode { name: String, reason: String },
}

/// Per-file format transform.
///
/// Implementations must be `Send + Sync`: the threaded runner hands the
/// codec to a background thread, and files within a group are transformed
/// in parallel.
pub trait CodecPort: Send + Sync {
    /// Short identifier shown in logs.
    fn name(&self) -> &'static str;

    /// Turn the source file's bytes into bytes of the direction's target format.
    fn transform(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        direction: Direction,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Stub codec: returns the input bytes untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughCodec;

impl CodecPort for PassthroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn transform(
        &self,
        bytes: Vec<u8>,
        _source_name: &str,
        _direction: Direction,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(bytes)
    }
}

/// Codec selection as written in config and on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecChoice {
    #[default]
    Passthrough,
    Native,
}

impl CodecChoice {
    /// Instantiate the chosen codec. `quality` only affects the native codec.
    pub fn build(self, quality: u32) -> Arc<dyn CodecPort> {
        match self {
            CodecChoice::Passthrough => Arc::new(PassthroughCodec),
            CodecChoice::Native => Arc::new(NativeCodec::new(Quality::new(quality))),
        }
    }
}

impl FromStr for CodecChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passthrough" => Ok(CodecChoice::Passthrough),
            "native" => Ok(CodecChoice::Native),
            other => Err(format!(
                "unknown codec '{other}' (expected passthrough or native)"
            )),
        }
    }
}

/// Lossy encoding quality (1-100). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}
