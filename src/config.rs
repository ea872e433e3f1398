//! Application configuration.
//!
//! Handles loading, validating, and merging `imageflip.toml`. User values
//! are layered on top of stock defaults; the file is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! site = "auto"              # "auto" | "aviflip" | "jpgflip"
//! hostname = ""              # Used to pick the site when site = "auto"
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! background_worker = true   # false forces in-process chunked conversion
//! codec = "passthrough"      # "passthrough" | "native"
//! quality = 90               # Native codec encoding quality (1-100)
//! max_archive_mb = 2048      # Batches whose archive grows past this fail
//!
//! [download]
//! force_binary_mime = false  # Save single files as application/octet-stream
//! settle_delay_ms = 0        # Pause before triggering the download
//! ```
//!
//! ## Site Profiles
//!
//! The same pipeline is branded two ways. The profile is resolved once at
//! startup and only seeds the initial conversion direction and display names:
//!
//! | Site | Domain | Default direction |
//! |---|---|---|
//! | AVIFlip | `aviflip.com` | AVIF → JPG |
//! | JPGFlip | `jpgflip.com` | JPG → AVIF |
//!
//! An explicit `site` wins; otherwise `hostname` is matched exactly
//! (with or without `www.`); anything else falls back to AVIFlip.
//!
//! Unknown keys are rejected to catch typos early.

use crate::codec::CodecChoice;
use crate::download::DownloadOptions;
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILENAME: &str = "imageflip.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imageflip.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Which site profile to use.
    pub site: SiteChoice,
    /// Host name the pipeline is served under (only read when `site = "auto"`).
    pub hostname: String,
    /// Worker and codec settings.
    pub processing: ProcessingConfig,
    /// Download delivery settings.
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.processing.quality) {
            return Err(ConfigError::Validation(
                "processing.quality must be 1-100".into(),
            ));
        }
        if self.processing.max_archive_mb == 0 {
            return Err(ConfigError::Validation(
                "processing.max_archive_mb must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.download.settle_delay_ms > 10_000 {
            return Err(ConfigError::Validation(
                "download.settle_delay_ms must be at most 10000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteChoice {
    #[default]
    Auto,
    Aviflip,
    Jpgflip,
}

/// Worker and codec settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Allow conversion on a background thread when the host supports it.
    pub background_worker: bool,
    /// Which codec transforms each file.
    pub codec: CodecChoice,
    /// Encoding quality for the native codec (1-100).
    pub quality: u32,
    /// Ceiling for a batch archive, in MiB.
    pub max_archive_mb: u64,
}

impl ProcessingConfig {
    /// `max_archive_mb` in bytes.
    pub fn archive_limit(&self) -> u64 {
        self.max_archive_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            background_worker: true,
            codec: CodecChoice::default(),
            quality: 90,
            max_archive_mb: 2048,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Download delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Deliver single files as `application/octet-stream`.
    pub force_binary_mime: bool,
    /// Milliseconds to wait before handing the artifact to the sink.
    pub settle_delay_ms: u64,
}

impl DownloadConfig {
    pub fn options(&self) -> DownloadOptions {
        DownloadOptions {
            force_binary_mime: self.force_binary_mime,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

// =============================================================================
// Site profiles
// =============================================================================

/// Branding resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteProfile {
    pub site_name: &'static str,
    pub logo_text: &'static str,
    pub domain: &'static str,
    pub default_direction: Direction,
}

impl SiteProfile {
    pub fn aviflip() -> Self {
        Self {
            site_name: "AVIFlip",
            logo_text: "AVIFlip",
            domain: "aviflip.com",
            default_direction: Direction::AvifToJpg,
        }
    }

    pub fn jpgflip() -> Self {
        Self {
            site_name: "JPGFlip",
            logo_text: "JPGFlip",
            domain: "jpgflip.com",
            default_direction: Direction::JpgToAvif,
        }
    }
}

/// Match a host name against the known site domains.
pub fn site_for_hostname(hostname: &str) -> Option<SiteProfile> {
    match hostname.trim().to_ascii_lowercase().as_str() {
        "jpgflip.com" | "www.jpgflip.com" => Some(SiteProfile::jpgflip()),
        "aviflip.com" | "www.aviflip.com" => Some(SiteProfile::aviflip()),
        _ => None,
    }
}

/// Resolve the site profile: explicit choice → hostname → AVIFlip.
pub fn resolve_site(config: &AppConfig) -> SiteProfile {
    match config.site {
        SiteChoice::Aviflip => SiteProfile::aviflip(),
        SiteChoice::Jpgflip => SiteProfile::jpgflip(),
        SiteChoice::Auto => {
            site_for_hostname(&config.hostname).unwrap_or_else(SiteProfile::aviflip)
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `imageflip.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `imageflip.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `imageflip.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imageflip configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Site profile: "auto", "aviflip" or "jpgflip".
# The profile picks the default conversion direction:
#   aviflip -> AVIF to JPG, jpgflip -> JPG to AVIF.
site = "auto"

# With site = "auto", the profile is chosen from this host name
# (jpgflip.com / aviflip.com, with or without www.). Anything else -> aviflip.
hostname = ""

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Convert on a background thread when available. Set to false to convert
# in-process, three files at a time.
background_worker = true

# "passthrough" keeps the bytes and only renames/relabels the output.
# "native" re-encodes JPEG/PNG sources (AVIF sources cannot be decoded).
codec = "passthrough"

# Encoding quality for the native codec (1 = worst, 100 = best).
quality = 90

# Multi-file batches are zipped in memory. A batch whose archive would grow
# past this many MiB fails instead.
max_archive_mb = 2048

# ---------------------------------------------------------------------------
# Download
# ---------------------------------------------------------------------------
[download]
# Deliver single files as application/octet-stream so they are always
# saved rather than opened.
force_binary_mime = false

# Milliseconds to wait before triggering the download (0 = no wait).
settle_delay_ms = 0
"##
}
