//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Sanitize a file stem by replacing path separators and other invalid characters
///
/// Map names such as `workshop/123456/de_dust2` must not escape the assets
/// directory when turned into a file name.
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re = INVALID_CHARS
        .get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("Invalid regex pattern"));

    let sanitized = re.replace_all(filename.trim(), "_").to_string();

    // "." and ".." would still walk the directory tree
    if sanitized.chars().all(|c| c == '.') {
        return "_".repeat(sanitized.len().max(1));
    }

    sanitized
}

/// Truncate text to at most `max_chars` characters, appending "..." when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let truncated: String = text.chars().take(keep).collect();
    format!("{truncated}...")
}
