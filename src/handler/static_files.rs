//! Static file serving module
//!
//! Maps a request path onto the served root, redirects to the canonical URL
//! form, and hands directories to the listing and files to the content
//! responder.

use crate::config::AppState;
use crate::error::ServeError;
use crate::handler::content::{serve_content, ContentOptions};
use crate::http::{self, cache, ResponseHead, ServeBody};
use crate::logger;
use chrono::{DateTime, Utc};
use hyper::header::ETAG;
use hyper::http::request::Parts;
use hyper::{Method, Response};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};

/// Serve the resource named by the request path
pub async fn serve_path(req: &Parts, state: &AppState) -> Response<ServeBody> {
    let is_head = req.method == Method::HEAD;
    let url_path = req.uri.path();

    let Some(relative) = decode_path(url_path) else {
        return http::build_404_response(is_head);
    };
    let fs_path = state.root.join(&relative);

    let Ok((file, metadata)) = open(&fs_path, &state.root, url_path).await else {
        return http::build_404_response(is_head);
    };

    if let Some(location) = canonical_redirect(url_path, metadata.is_dir(), req.uri.query()) {
        return http::build_redirect_response(&location);
    }

    if metadata.is_dir() {
        drop(file);
        return serve_listing(&fs_path, state, is_head).await;
    }

    let name = fs_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    let size = metadata.len();

    let mut head = ResponseHead::new();
    if state.config.http.etag {
        head.set_header(ETAG, &cache::generate_etag(size, modified.as_ref()));
    }
    let options = ContentOptions {
        ignore_overlong_ranges: state.config.http.ignore_overlong_ranges,
    };

    serve_content(req, head, &name, modified, move || Ok(size), file, options).await
}

/// Open `path` and read its metadata, refusing anything that resolves outside `root`
async fn open(
    path: &Path,
    root: &Path,
    url_path: &str,
) -> Result<(File, std::fs::Metadata), ServeError> {
    // File not found is common (404), no need to log it
    let canonical = fs::canonicalize(path).await.map_err(|_| ServeError::NotFound)?;
    if !canonical.starts_with(root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {url_path} -> {}",
            canonical.display()
        ));
        return Err(ServeError::NotFound);
    }

    let file = File::open(&canonical).await.map_err(|_| ServeError::NotFound)?;
    let metadata = file.metadata().await.map_err(|_| ServeError::NotFound)?;
    Ok((file, metadata))
}

async fn serve_listing(dir: &Path, state: &AppState, is_head: bool) -> Response<ServeBody> {
    if !state.config.listing.enabled {
        return http::build_404_response(is_head);
    }

    let entries = match state.listing.read_entries(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            logger::log_error(&format!("Failed to read directory '{}': {e}", dir.display()));
            return http::build_404_response(is_head);
        }
    };

    let title = dir
        .file_name()
        .map_or_else(|| "/".to_string(), |n| n.to_string_lossy().into_owned());
    http::build_html_response(state.listing.render(&title, entries), is_head)
}

/// Percent-decode a request path and normalize it into a path relative to the root
///
/// `.` and empty segments are dropped and `..` removes the previous segment,
/// never climbing above the root. Returns `None` for paths that do not decode
/// to UTF-8 or that contain a NUL byte.
pub fn decode_path(url_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(url_path).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    Some(segments.iter().collect())
}

/// Location of the canonical URL when `url_path` is not in canonical form
///
/// Directories end with `/`; files do not. The redirect is relative to the
/// request and keeps the query string.
pub fn canonical_redirect(url_path: &str, is_dir: bool, query: Option<&str>) -> Option<String> {
    let trimmed = url_path.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or_default();

    let mut location = match (is_dir, url_path.ends_with('/')) {
        (true, false) => format!("{base}/"),
        (false, true) => format!("../{base}"),
        _ => return None,
    };
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        location.push('?');
        location.push_str(q);
    }
    Some(location)
}
