//! CLI output formatting for the conversion pipeline.
//!
//! # Output Format
//!
//! ## Pending batch
//!
//! ```text
//! 3 file(s) ready (AVIF → JPG)
//!     001 a.avif (1.5 KB)
//!     002 b.png (820 Bytes)
//!     003 c.jpg (2 MB)
//! ```
//!
//! ## Status events
//!
//! ```text
//! Converting...
//!     33% complete (1/3 files)
//!     67% complete (2/3 files)
//!     100% complete (3/3 files)
//! Conversion complete: converted_images.zip (3 files)
//! ```
//!
//! With `--json`, each status event is printed as one JSON line instead.
//!
//! # Architecture
//!
//! Every `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::capability::Capabilities;
use crate::config::SiteProfile;
use crate::naming::format_file_size;
use crate::orchestrator::{Status, StatusEvent};
use crate::types::{Direction, PendingFile};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Pending batch
// ============================================================================

/// Format the staged batch: count header then one line per file.
pub fn format_pending_files(files: &[PendingFile], direction: Direction) -> Vec<String> {
    let mut lines = vec![format!(
        "{} file(s) ready ({})",
        files.len(),
        direction.label()
    )];
    for (i, file) in files.iter().enumerate() {
        lines.push(format!(
            "{}{} {} ({})",
            indent(1),
            format_index(i + 1),
            file.name,
            format_file_size(file.byte_size)
        ));
    }
    lines
}

pub fn print_pending_files(files: &[PendingFile], direction: Direction) {
    for line in format_pending_files(files, direction) {
        println!("{}", line);
    }
}

// ============================================================================
// Status events
// ============================================================================

/// Format one status event.
///
/// Progress events only print a progress line; the `Processing` transition
/// itself (0%) prints the header.
pub fn format_status_event(event: &StatusEvent) -> Vec<String> {
    match event.status {
        Status::Idle => vec!["Drop image files to convert (AVIF, PNG, JPG)".to_string()],
        Status::Ready => vec![format!("{} file(s) ready", event.total_files)],
        Status::Processing if event.current_file == 0 => vec!["Converting...".to_string()],
        Status::Processing => vec![format!(
            "{}{}% complete ({}/{} files)",
            indent(1),
            event.percent,
            event.current_file,
            event.total_files
        )],
        Status::Success => {
            let mut lines = vec![format!(
                "Conversion complete: {}",
                event.result.as_deref().unwrap_or("done")
            )];
            if let Some(warning) = &event.warning {
                lines.push(format!("{}Warning: {}", indent(1), warning));
            }
            lines
        }
        Status::Error => vec![
            format!(
                "Error: {}",
                event.error.as_deref().unwrap_or("Conversion failed")
            ),
            format!("{}Drop files again to retry", indent(1)),
        ],
    }
}

/// Format one status event as a single JSON line.
pub fn format_status_json(event: &StatusEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

// ============================================================================
// Probe
// ============================================================================

/// Format detected capabilities and the resolved site profile.
pub fn format_probe(
    caps: &Capabilities,
    site: &SiteProfile,
    runner: &str,
    codec: &str,
) -> Vec<String> {
    vec![
        format!("Site: {} ({})", site.site_name, site.domain),
        format!("{}Logo: {}", indent(1), site.logo_text),
        format!("{}Default direction: {}", indent(1), site.default_direction.label()),
        "Capabilities".to_string(),
        format!(
            "{}Background worker: {}",
            indent(1),
            if caps.supports_background_worker {
                "yes"
            } else {
                "no"
            }
        ),
        format!("{}Available threads: {}", indent(1), caps.available_threads),
        format!("{}Runner: {}", indent(1), runner),
        format!("{}Codec: {}", indent(1), codec),
    ]
}

pub fn print_probe(caps: &Capabilities, site: &SiteProfile, runner: &str, codec: &str) {
    for line in format_probe(caps, site, runner, codec) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::memory_file;

    fn event(status: Status) -> StatusEvent {
        StatusEvent {
            status,
            direction: Direction::AvifToJpg,
            percent: 0,
            current_file: 0,
            total_files: 3,
            error: None,
            result: None,
            warning: None,
        }
    }

    #[test]
    fn pending_files_list() {
        let files = vec![memory_file("a.avif"), memory_file("b.png")];
        let lines = format_pending_files(&files, Direction::AvifToJpg);
        assert_eq!(lines[0], "2 file(s) ready (AVIF \u{2192} JPG)");
        assert_eq!(lines[1], "    001 a.avif (17 Bytes)");
        assert_eq!(lines[2], "    002 b.png (16 Bytes)");
    }

    #[test]
    fn processing_header_then_progress() {
        assert_eq!(
            format_status_event(&event(Status::Processing)),
            vec!["Converting..."]
        );
        let progress = StatusEvent {
            percent: 67,
            current_file: 2,
            ..event(Status::Processing)
        };
        assert_eq!(
            format_status_event(&progress),
            vec!["    67% complete (2/3 files)"]
        );
    }

    #[test]
    fn success_with_warning() {
        let done = StatusEvent {
            result: Some("a.jpg (image/jpeg)".into()),
            warning: Some("disk full".into()),
            ..event(Status::Success)
        };
        assert_eq!(
            format_status_event(&done),
            vec![
                "Conversion complete: a.jpg (image/jpeg)",
                "    Warning: disk full"
            ]
        );
    }

    #[test]
    fn error_prompts_retry() {
        let failed = StatusEvent {
            error: Some("Failed to read b.avif".into()),
            ..event(Status::Error)
        };
        let lines = format_status_event(&failed);
        assert_eq!(lines[0], "Error: Failed to read b.avif");
        assert_eq!(lines[1], "    Drop files again to retry");
    }

    #[test]
    fn json_line_omits_empty_fields() {
        let json = format_status_json(&event(Status::Ready));
        assert_eq!(
            json,
            r#"{"status":"ready","direction":"avif-to-jpg","percent":0,"current_file":0,"total_files":3}"#
        );
    }

    #[test]
    fn probe_lines() {
        let caps = Capabilities {
            supports_background_worker: true,
            available_threads: 8,
        };
        let lines = format_probe(&caps, &SiteProfile::jpgflip(), "threaded", "passthrough");
        assert_eq!(lines[0], "Site: JPGFlip (jpgflip.com)");
        assert_eq!(lines[1], "    Logo: JPGFlip");
        assert_eq!(lines[2], "    Default direction: JPG \u{2192} AVIF");
        assert_eq!(lines[4], "    Background worker: yes");
        assert_eq!(lines[6], "    Runner: threaded");
    }
}
