//! Conditional request evaluation
//!
//! Decides whether a request is already satisfied by the client's cached copy
//! (304) and whether its Range header should be honored at all.

use super::cache::check_etag_match;
use super::date::{format_http_date, parse_http_date};
use super::response::ResponseHead;
use chrono::{DateTime, Duration, Utc};
use hyper::header::{self, HeaderMap};
use hyper::http::request::Parts;
use hyper::Method;

/// Outcome of the `If-Range` / `If-None-Match` checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalOutcome {
    /// Range header to act on, `None` when absent or invalidated by `If-Range`
    pub effective_range: Option<String>,
    /// The head has been finalized as 304; no body processing follows
    pub satisfied: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &header::HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Evaluate `If-Modified-Since`
///
/// `modified` is compared at one-second granularity since HTTP-dates carry no
/// fractions: the resource is unmodified when `modified < since + 1s`. The
/// check is skipped when `If-None-Match` is present, which takes precedence.
///
/// Returns true when `head` has been finalized as 304. Otherwise sets
/// `Last-Modified` (when the time is known) and returns false.
pub fn check_last_modified(
    req: &Parts,
    head: &mut ResponseHead,
    modified: Option<&DateTime<Utc>>,
) -> bool {
    let Some(modified) = modified else {
        return false;
    };

    let has_if_none_match = header_str(&req.headers, &header::IF_NONE_MATCH).is_some();
    if !has_if_none_match {
        let since = header_str(&req.headers, &header::IF_MODIFIED_SINCE).and_then(parse_http_date);
        if since.is_some_and(|since| *modified < since + Duration::seconds(1)) {
            head.not_modified();
            return true;
        }
    }

    head.set_header(header::LAST_MODIFIED, &format_http_date(modified));
    false
}

/// Evaluate `If-Range` and `If-None-Match`
///
/// The entity tag is whatever `ETag` the caller placed on `head` beforehand.
/// `If-Range` may carry either that tag or an HTTP-date equal to `modified`.
pub fn check_conditional(
    req: &Parts,
    head: &mut ResponseHead,
    modified: Option<&DateTime<Utc>>,
) -> ConditionalOutcome {
    let etag = head.header_str(&header::ETAG).unwrap_or_default().to_string();
    let mut effective_range = header_str(&req.headers, &header::RANGE).map(ToString::to_string);

    if let Some(if_range) = header_str(&req.headers, &header::IF_RANGE) {
        if if_range != etag && !if_range_date_matches(if_range, modified) {
            effective_range = None;
        }
    }

    if let Some(if_none_match) = header_str(&req.headers, &header::IF_NONE_MATCH) {
        // Must know ETag; non-GET/HEAD methods are not special-cased
        let applies = !etag.is_empty() && (req.method == Method::GET || req.method == Method::HEAD);
        if applies && check_etag_match(if_none_match, &etag) {
            head.not_modified();
            return ConditionalOutcome {
                effective_range: None,
                satisfied: true,
            };
        }
    }

    ConditionalOutcome {
        effective_range,
        satisfied: false,
    }
}

fn if_range_date_matches(value: &str, modified: Option<&DateTime<Utc>>) -> bool {
    match (modified, parse_http_date(value)) {
        (Some(modified), Some(date)) => modified.timestamp() == date.timestamp(),
        _ => false,
    }
}
