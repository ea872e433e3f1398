//! Centralized filename handling for intake and output naming.
//!
//! Every stage of the pipeline agrees on the same rules:
//!
//! - **Accepted inputs**: names ending in `.avif`, `.png`, `.jpg` or `.jpeg`,
//!   compared case-insensitively.
//! - **Output names**: the source extension (everything after the last dot)
//!   is replaced by the direction's target extension:
//!   `holiday.avif` → `holiday.jpg`, `scan.PNG` → `scan.avif`.
//! - **No directories**: only the last path component of a name is used
//!   for output, so `../x.avif` becomes `x.jpg`.
//! - **Archive entries**: output names are made unique within one archive by
//!   suffixing `-2`, `-3`, … before the extension, so `a.jpg` and `a.jpeg`
//!   converted to AVIF become `a.avif` and `a-2.avif`.

use crate::types::Direction;
use std::collections::HashSet;

/// Extensions (lowercase, without dot) accepted by intake.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["avif", "png", "jpg", "jpeg"];

/// Extension after the last dot, if any.
pub fn extension_of(name: &str) -> Option<&str> {
    name.rfind('.').map(|pos| &name[pos + 1..])
}

/// Last path component of a name, splitting on both `/` and `\`.
pub fn plain_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Name with its last extension removed. Names without a dot are returned unchanged.
pub fn stem_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// Whether intake accepts a file with this name.
pub fn is_accepted(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| {
        ACCEPTED_EXTENSIONS
            .iter()
            .any(|accepted| ext.eq_ignore_ascii_case(accepted))
    })
}

/// MIME type implied by a file name's extension.
pub fn mime_for_name(name: &str) -> &'static str {
    match extension_of(name).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("avif") => "image/avif",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Output name for one converted file: source extension swapped for the target one.
pub fn output_name(name: &str, direction: Direction) -> String {
    format!("{}.{}", stem_of(plain_name(name)), direction.target_extension())
}

/// Output names for a whole batch, in input order, with collisions resolved.
pub fn unique_output_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
    direction: Direction,
) -> Vec<String> {
    let mut used = HashSet::new();
    let mut result = Vec::new();
    for name in names {
        let stem = stem_of(plain_name(name));
        let ext = direction.target_extension();
        let mut candidate = format!("{stem}.{ext}");
        let mut counter = 2;
        while used.contains(&candidate) {
            candidate = format!("{stem}-{counter}.{ext}");
            counter += 1;
        }
        used.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

/// Human-readable size, 1024-based: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
