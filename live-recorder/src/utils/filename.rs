//! Filename sanitization for capture output paths.
//!
//! Anchor names and titles come straight from the platforms and may contain
//! anything; everything that ends up in a path goes through
//! [`sanitize_filename`] first. CJK text is preserved.

use chrono::{DateTime, Local};

/// Characters that are invalid in Windows filenames
const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Upper bound on the length of a single path component, in chars.
const MAX_COMPONENT_CHARS: usize = 80;

/// Sanitize a string for use as a single path component on every platform.
///
/// Invalid and control characters become `_` (runs are collapsed), leading
/// and trailing spaces/dots are trimmed, reserved Windows names get a `_`
/// prefix and the result is capped in length. Empty input yields `unnamed`.
pub fn sanitize_filename(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_was_replacement = false;

    for c in input.chars().take(MAX_COMPONENT_CHARS) {
        if c.is_control() || WINDOWS_INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let upper = trimmed.to_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", trimmed);
        }
    }

    trimmed.to_string()
}

/// File stem for a capture started at `at`: `<anchor>_<YYYY-MM-DD_HH-MM-SS>`.
pub fn capture_file_stem(anchor_name: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}",
        sanitize_filename(anchor_name),
        at.format("%Y-%m-%d_%H-%M-%S")
    )
}
