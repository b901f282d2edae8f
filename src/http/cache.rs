//! HTTP cache validator module
//!
//! Provides `ETag` generation and `If-None-Match` token matching.

use chrono::{DateTime, Utc};

/// Generate `ETag` from file size and modification time
///
/// Cheap to compute on every request since no content is read. Two versions
/// of a file that share both size and mtime (to the second) share a tag.
///
/// # Returns
/// Quoted `ETag` string, e.g., `"2c8e1f3a-1f4"`
pub fn generate_etag(size: u64, modified: Option<&DateTime<Utc>>) -> String {
    let secs = modified.map_or(0, DateTime::timestamp);
    format!("\"{secs:x}-{size:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
///
/// Returns true if matched (should return 304), false otherwise
pub fn check_etag_match(if_none_match: &str, etag: &str) -> bool {
    if_none_match.trim() == etag
        || if_none_match
            .split(',')
            .map(str::trim)
            .any(|e| e == etag || e == "*")
}
