//! HTTP response building module
//!
//! [`ResponseHead`] is the response under construction: handlers set headers and
//! the status on it, and anything wrapping the handler (access logging) reads the
//! final status back through [`ResponseHead::status`]. The builders below cover the
//! canned responses that carry no file content.

use super::body::ServeBody;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};

const NOT_FOUND_PAGE: &str = r#"<html>
	<head>
		<title>404 | Not Found</title>
		<style>
		body {margin: 0; padding-top: 10px; background-color: #edece4; font-family: Tahoma, Geneva, sans-serif; color: #4d4d4d}
		.contents {margin: 0 auto; padding: 40px 80px; text-align: center; background-color: #fff; border: solid 1px #d9d8d4; width: 400px;}
		</style>
	</head>
	<body>
		<div class = "contents">
			<h1>404</h1>
			<h2>Not Found</h2>
		</div>
	</body>
</html>
"#;

/// Status and headers of a response that has not been sent yet
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHead {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text, `None` if absent or not visible ASCII
    pub fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a header from a string, logging and skipping values that are not valid header text
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
            }
            Err(e) => log_build_error(name.as_str(), &e),
        }
    }

    /// Finalize as 304 Not Modified: entity headers describing a body are dropped
    pub fn not_modified(&mut self) {
        self.headers.remove(header::CONTENT_TYPE);
        self.headers.remove(header::CONTENT_LENGTH);
        self.status = StatusCode::NOT_MODIFIED;
    }

    pub fn into_response(self, body: ServeBody) -> Response<ServeBody> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Build a plain-text error response carrying `message`
pub fn build_error_response(status: StatusCode, message: &str) -> Response<ServeBody> {
    let body = format!("{message}\n");
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .header(header::CONTENT_LENGTH, body.len())
        .body(ServeBody::full(body))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

/// Build 404 Not Found response
pub fn build_404_response(is_head: bool) -> Response<ServeBody> {
    let body = if is_head {
        ServeBody::empty()
    } else {
        ServeBody::full(NOT_FOUND_PAGE)
    };
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CONTENT_LENGTH, NOT_FOUND_PAGE.len())
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            fallback(StatusCode::NOT_FOUND)
        })
}

/// Build 416 Range Not Satisfiable response from `head`
///
/// Validators already on `head` (`ETag`, `Last-Modified`) are kept; the
/// entity headers are replaced by those of the plain-text message.
pub fn build_416_response(
    mut head: ResponseHead,
    size: u64,
    message: &str,
) -> Response<ServeBody> {
    let body = format!("{message}\n");
    head.headers.remove(header::CONTENT_ENCODING);
    head.set_status(StatusCode::RANGE_NOT_SATISFIABLE);
    head.set_header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
    head.set_header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    head.set_header(header::CONTENT_LENGTH, &body.len().to_string());
    head.set_header(header::CONTENT_RANGE, &format!("bytes */{size}"));
    head.into_response(ServeBody::full(body))
}

/// Build 301 redirect to a path relative to the current URL
pub fn build_redirect_response(location: &str) -> Response<ServeBody> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location)
        .body(ServeBody::empty())
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            fallback(StatusCode::MOVED_PERMANENTLY)
        })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<ServeBody> {
    let content_length = content.len();
    let body = if is_head {
        ServeBody::empty()
    } else {
        ServeBody::full(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .header(header::CONTENT_LENGTH, content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            fallback(StatusCode::INTERNAL_SERVER_ERROR)
        })
}

fn fallback(status: StatusCode) -> Response<ServeBody> {
    let mut response = Response::new(ServeBody::empty());
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(what: &str, error: &dyn std::fmt::Display) {
    crate::logger::log_error(&format!("Failed to build {what} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_tracks_status() {
        let mut head = ResponseHead::new();
        assert_eq!(head.status(), StatusCode::OK);
        head.set_status(StatusCode::PARTIAL_CONTENT);
        let response = head.into_response(ServeBody::empty());
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[test]
    fn test_not_modified_strips_entity_headers() {
        let mut head = ResponseHead::new();
        head.set_header(header::CONTENT_TYPE, "text/plain");
        head.set_header(header::CONTENT_LENGTH, "10");
        head.set_header(header::ETAG, "\"abc\"");
        head.not_modified();
        assert_eq!(head.status(), StatusCode::NOT_MODIFIED);
        assert!(head.headers().get(header::CONTENT_TYPE).is_none());
        assert!(head.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(head.header_str(&header::ETAG), Some("\"abc\""));
    }

    #[test]
    fn test_invalid_header_value_skipped() {
        let mut head = ResponseHead::new();
        head.set_header(header::CONTENT_TYPE, "bad\nvalue");
        assert!(head.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_416_response() {
        let mut head = ResponseHead::new();
        head.set_header(header::ETAG, "\"v2\"");
        head.set_header(header::LAST_MODIFIED, "Fri, 01 Mar 2024 12:00:00 GMT");
        head.set_header(header::CONTENT_TYPE, "video/mp4");
        head.set_header(header::CONTENT_ENCODING, "gzip");

        let response = build_416_response(head, 1000, "invalid range");
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_RANGE).unwrap(), "bytes */1000");
        assert_eq!(headers.get(header::ETAG).unwrap(), "\"v2\"");
        assert_eq!(
            headers.get(header::LAST_MODIFIED).unwrap(),
            "Fri, 01 Mar 2024 12:00:00 GMT"
        );
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "14");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
    }

    #[test]
    fn test_redirect_response() {
        let response = build_redirect_response("docs/?q=1");
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "docs/?q=1");
    }

    #[test]
    fn test_head_html_has_length_but_no_body() {
        use hyper::body::Body;
        let response = build_html_response("<p>hi</p>".to_string(), true);
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "9");
        assert!(response.body().is_end_stream());
    }
}
