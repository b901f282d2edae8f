//! HTTP Range request parsing module
//!
//! Range header parsing for partial content delivery, following RFC 2616 byte-range semantics.
//! Multiple ranges are returned in request order; overlap is left for the caller to judge.

use crate::error::{Result, ServeError};

const BYTES_PREFIX: &str = "bytes=";

/// A satisfiable byte window of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Number of bytes in the window
    pub length: u64,
}

impl ByteRange {
    /// Last byte offset (inclusive)
    #[inline]
    pub const fn end(&self) -> u64 {
        (self.start + self.length).saturating_sub(1)
    }

    /// Render the `Content-Range` value for this window
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end(), size)
    }
}

/// Total number of bytes requested across all ranges
pub fn sum_lengths(ranges: &[ByteRange]) -> u64 {
    ranges
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.length))
}

/// Parse HTTP Range header against a resource of `size` bytes
///
/// Supported formats (comma separated, any number):
/// - `bytes=start-end` - Specific range, `end` clamped to the last byte
/// - `bytes=start-` - From start to end
/// - `bytes=-suffix` - Last suffix bytes, clamped to the whole resource
///
/// An empty header yields an empty set. Specs that are well formed but cover
/// no bytes (`bytes=N-` with `N == size`, `bytes=-0`, or any range of an empty
/// resource) are dropped, so every returned range has a non-zero length.
///
/// # Examples
/// ```
/// use fileserver::http::range::{parse_range, ByteRange};
///
/// let ranges = parse_range("bytes=0-99", 1000).unwrap();
/// assert_eq!(ranges, vec![ByteRange { start: 0, length: 100 }]);
///
/// assert!(parse_range("", 1000).unwrap().is_empty());
/// assert!(parse_range("items=0-1", 1000).is_err());
/// ```
pub fn parse_range(header: &str, size: u64) -> Result<Vec<ByteRange>> {
    if header.is_empty() {
        return Ok(Vec::new());
    }

    let Some(specs) = header.strip_prefix(BYTES_PREFIX) else {
        return Err(ServeError::InvalidRange);
    };

    let mut ranges = Vec::new();
    for spec in specs.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }

        let Some((start_str, end_str)) = spec.split_once('-') else {
            return Err(ServeError::InvalidRange);
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        let range = if start_str.is_empty() {
            parse_suffix_range(end_str, size)?
        } else {
            parse_standard_range(start_str, end_str, size)?
        };
        if range.length > 0 {
            ranges.push(range);
        }
    }

    Ok(ranges)
}

/// Parse suffix range (e.g., "-500")
fn parse_suffix_range(suffix_str: &str, size: u64) -> Result<ByteRange> {
    let suffix = parse_position(suffix_str)?.min(size);
    Ok(ByteRange {
        start: size - suffix,
        length: suffix,
    })
}

/// Parse standard range (e.g., "0-99" or "100-")
fn parse_standard_range(start_str: &str, end_str: &str, size: u64) -> Result<ByteRange> {
    let start = parse_position(start_str)?;
    if start > size {
        return Err(ServeError::InvalidRange);
    }

    if end_str.is_empty() {
        return Ok(ByteRange {
            start,
            length: size - start,
        });
    }

    let end = parse_position(end_str)?;
    if start > end {
        return Err(ServeError::InvalidRange);
    }
    let length = match size.checked_sub(1) {
        Some(last) => (end.min(last) + 1).saturating_sub(start),
        None => 0,
    };

    Ok(ByteRange { start, length })
}

/// Digits only: `u64::from_str` would also accept a leading `+`
fn parse_position(s: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServeError::InvalidRange);
    }
    s.parse::<u64>().map_err(|_| ServeError::InvalidRange)
}
