use lazy_static::lazy_static;
use regex::Regex;

use crate::shared::constants::FALLBACK_FILENAME;

lazy_static! {
    /// Runs of whitespace inside a filename, collapsed to a single underscore
    pub static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();

    /// Share tokens are hyphenated UUIDs
    /// - Valid: "0b6f1f0e-4a55-4c3e-9a55-2f4d2a9e8c11"
    /// - Invalid: "../etc/passwd", "abc", ""
    pub static ref TOKEN_REGEX: Regex =
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap();
}

/// Reduce a client-supplied filename to something safe to store and display.
///
/// Only the last path component is kept, whitespace becomes `_`, and anything
/// other than alphanumerics, `.`, `_` and `-` is dropped (this removes control
/// characters and path separators). Leading/trailing dots and underscores are
/// trimmed so the result can never be `.` or `..`.
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let spaced = WHITESPACE_REGEX.replace_all(last.trim(), "_");

    let cleaned: String = spaced
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn is_valid_token(token: &str) -> bool {
    TOKEN_REGEX.is_match(token)
}
