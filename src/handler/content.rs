//! Content responder
//!
//! Turns an opened, seekable resource into a complete response: validators,
//! content typing, range selection, then a body that copies exactly the
//! declared number of bytes.

use crate::error::{Result, ServeError};
use crate::http::conditional::{check_conditional, check_last_modified};
use crate::http::multipart::MultipartRanges;
use crate::http::range::{parse_range, sum_lengths};
use crate::http::sniff::{detect_content_type, SNIFF_LEN};
use crate::http::{self, mime, ResponseHead, ServeBody};
use crate::logger;
use chrono::{DateTime, Utc};
use hyper::header::{ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{Method, Response, StatusCode};
use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Per-server knobs for [`serve_content`]
#[derive(Debug, Clone, Copy)]
pub struct ContentOptions {
    /// Serve the full resource instead of 416 when ranges sum past its size
    pub ignore_overlong_ranges: bool,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            ignore_overlong_ranges: true,
        }
    }
}

/// Answer `req` with the bytes of `content`
///
/// `head` may already carry an `ETag`, a `Content-Type` or a
/// `Content-Encoding`; they are honored as given. `size_fn` is only called
/// once the request is known not to be satisfied by a validator.
pub async fn serve_content<R, F>(
    req: &Parts,
    head: ResponseHead,
    name: &str,
    modified: Option<DateTime<Utc>>,
    size_fn: F,
    content: R,
    options: ContentOptions,
) -> Response<ServeBody>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    F: FnOnce() -> io::Result<u64>,
{
    match respond(req, head, name, modified.as_ref(), size_fn, content, options).await {
        Ok(response) => response,
        Err(e) => {
            logger::log_error(&format!("Serving '{name}' failed: {e}"));
            http::build_error_response(e.status_code(), &e.to_string())
        }
    }
}

async fn respond<R, F>(
    req: &Parts,
    mut head: ResponseHead,
    name: &str,
    modified: Option<&DateTime<Utc>>,
    size_fn: F,
    mut content: R,
    options: ContentOptions,
) -> Result<Response<ServeBody>>
where
    R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    F: FnOnce() -> io::Result<u64>,
{
    if check_last_modified(req, &mut head, modified) {
        return Ok(head.into_response(ServeBody::empty()));
    }
    let outcome = check_conditional(req, &mut head, modified);
    if outcome.satisfied {
        return Ok(head.into_response(ServeBody::empty()));
    }

    let content_type = match head.header_str(&CONTENT_TYPE) {
        Some(ct) => ct.to_string(),
        None => {
            let ct = match mime::content_type_for(name) {
                Some(ct) => ct,
                None => sniff_content_type(&mut content).await?,
            };
            head.set_header(CONTENT_TYPE, ct);
            ct.to_string()
        }
    };

    let size = size_fn().map_err(ServeError::SizeUnavailable)?;

    let mut ranges = match parse_range(outcome.effective_range.as_deref().unwrap_or_default(), size)
    {
        Ok(ranges) => ranges,
        Err(e) => return Ok(http::build_416_response(head, size, &e.to_string())),
    };
    if sum_lengths(&ranges) > size {
        if !options.ignore_overlong_ranges {
            let e = ServeError::OverlongRangeSet;
            return Ok(http::build_416_response(head, size, &e.to_string()));
        }
        ranges.clear();
    }

    let is_head = req.method == Method::HEAD;
    let (send_size, body) = match ranges.len() {
        0 => (size, ServeBody::limited(Box::new(content), size)),
        1 => {
            let range = ranges[0];
            content
                .seek(SeekFrom::Start(range.start))
                .await
                .map_err(ServeError::SeekFailed)?;
            head.set_status(StatusCode::PARTIAL_CONTENT);
            head.set_header(CONTENT_RANGE, &range.content_range(size));
            (range.length, ServeBody::limited(Box::new(content), range.length))
        }
        _ => {
            let multipart = MultipartRanges::new(ranges, &content_type, size);
            head.set_status(StatusCode::PARTIAL_CONTENT);
            head.set_header(CONTENT_TYPE, &multipart.content_type_header());
            let send_size = multipart.encoded_size();
            if is_head {
                (send_size, ServeBody::empty())
            } else {
                (send_size, multipart.into_body(content))
            }
        }
    };

    head.set_header(ACCEPT_RANGES, "bytes");
    let encoded = head.headers().contains_key(CONTENT_ENCODING);
    if !encoded {
        head.set_header(CONTENT_LENGTH, &send_size.to_string());
    }

    let body = match (is_head, encoded) {
        (true, _) => ServeBody::empty(),
        (false, true) => body.undeclared(),
        (false, false) => body,
    };
    Ok(head.into_response(body))
}

/// Detect the type from the first [`SNIFF_LEN`] bytes, then rewind
///
/// A read error ends sniffing early; whatever was read is still used.
async fn sniff_content_type<R>(content: &mut R) -> Result<&'static str>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        match content.read(&mut buf[filled..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    content
        .seek(SeekFrom::Start(0))
        .await
        .map_err(ServeError::SeekFailed)?;
    Ok(detect_content_type(&buf[..filled]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use hyper::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED, RANGE};
    use hyper::Request;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn parts(method: Method, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().method(method).uri("/data.txt");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn data() -> Vec<u8> {
        (0..100u8).map(|i| b'a' + i % 26).collect()
    }

    fn mtime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    async fn serve_bytes(
        req: &Parts,
        head: ResponseHead,
        content: Vec<u8>,
        options: ContentOptions,
    ) -> Response<ServeBody> {
        let size = content.len() as u64;
        let modified = Some(mtime());
        let source = Cursor::new(content);
        serve_content(req, head, "data.txt", modified, move || Ok(size), source, options).await
    }

    async fn serve(
        req: &Parts,
        head: ResponseHead,
        name: &str,
        options: ContentOptions,
    ) -> Response<ServeBody> {
        let content = data();
        let size = content.len() as u64;
        let source = Cursor::new(content);
        serve_content(req, head, name, Some(mtime()), move || Ok(size), source, options).await
    }

    async fn get(headers: &[(&str, &str)]) -> Response<ServeBody> {
        let req = parts(Method::GET, headers);
        serve(&req, ResponseHead::new(), "data.txt", ContentOptions::default()).await
    }

    fn header<'a>(
        response: &'a Response<ServeBody>,
        name: &hyper::header::HeaderName,
    ) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    async fn body_bytes(response: Response<ServeBody>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_full_response() {
        let response = get(&[]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &ACCEPT_RANGES), Some("bytes"));
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("100"));
        assert_eq!(header(&response, &CONTENT_TYPE), Some("text/plain; charset=utf-8"));
        assert_eq!(header(&response, &LAST_MODIFIED), Some("Fri, 01 Mar 2024 12:00:00 GMT"));
        assert_eq!(body_bytes(response).await, data());
    }

    #[tokio::test]
    async fn test_single_range() {
        let response = get(&[("range", "bytes=10-19")]).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&response, &CONTENT_RANGE), Some("bytes 10-19/100"));
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("10"));
        assert_eq!(body_bytes(response).await, data()[10..20].to_vec());
    }

    #[tokio::test]
    async fn test_suffix_range_clamped_to_size() {
        let response = get(&[("range", "bytes=-1000")]).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&response, &CONTENT_RANGE), Some("bytes 0-99/100"));
        assert_eq!(body_bytes(response).await, data());
    }

    #[tokio::test]
    async fn test_multiple_ranges() {
        let response = get(&[("range", "bytes=0-4, 90-")]).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let content_type = header(&response, &CONTENT_TYPE).unwrap().to_string();
        assert!(content_type.starts_with("multipart/byteranges; boundary="));
        let declared: usize = header(&response, &CONTENT_LENGTH).unwrap().parse().unwrap();

        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(body.len(), declared);
        assert!(body.contains(
            "Content-Range: bytes 0-4/100\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nabcde"
        ));
        assert!(body.contains("Content-Range: bytes 90-99/100"));
        assert_eq!(body.matches("Content-Range:").count(), 2);
    }

    #[tokio::test]
    async fn test_overlong_ranges_serve_whole_file() {
        let response = get(&[("range", "bytes=0-79,20-99")]).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &CONTENT_RANGE), None);
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("100"));
        assert_eq!(header(&response, &ACCEPT_RANGES), Some("bytes"));
        assert_eq!(body_bytes(response).await, data());
    }

    #[tokio::test]
    async fn test_overlong_ranges_rejected_when_strict() {
        let options = ContentOptions {
            ignore_overlong_ranges: false,
        };
        let req = parts(Method::GET, &[("range", "bytes=0-79,20-99")]);
        let response = serve(&req, tagged_head(), "data.txt", options).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(header(&response, &CONTENT_RANGE), Some("bytes */100"));
        assert_eq!(header(&response, &ETAG), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_invalid_range() {
        for value in ["bytes=50-10", "bytes=200-", "items=0-1", "bytes=x-1"] {
            let response = get(&[("range", value)]).await;
            assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{value}");
            assert_eq!(header(&response, &CONTENT_RANGE), Some("bytes */100"));
            assert_eq!(
                header(&response, &LAST_MODIFIED),
                Some("Fri, 01 Mar 2024 12:00:00 GMT")
            );
        }
    }

    #[tokio::test]
    async fn test_ranges_selecting_nothing_serve_whole_file() {
        let ten = b"0123456789".to_vec();
        let req = parts(Method::GET, &[(RANGE.as_str(), "bytes=10-")]);
        let response = serve_bytes(
            &req,
            ResponseHead::new(),
            ten.clone(),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &CONTENT_RANGE), None);
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("10"));
        assert_eq!(body_bytes(response).await, ten);

        let req = parts(Method::GET, &[(RANGE.as_str(), "bytes=0-5")]);
        let response = serve_bytes(
            &req,
            ResponseHead::new(),
            Vec::new(),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &CONTENT_RANGE), None);
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("0"));
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_suffix_dropped_from_set() {
        let ten = b"0123456789".to_vec();
        let req = parts(Method::GET, &[(RANGE.as_str(), "bytes=-0,0-1")]);
        let response = serve_bytes(&req, ResponseHead::new(), ten, ContentOptions::default()).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(header(&response, &CONTENT_RANGE), Some("bytes 0-1/10"));
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("2"));
        assert_eq!(body_bytes(response).await, b"01".to_vec());
    }

    #[tokio::test]
    async fn test_if_modified_since_wins_over_range() {
        let response = get(&[
            ("if-modified-since", "Fri, 01 Mar 2024 12:00:00 GMT"),
            ("range", "bytes=0-9"),
        ])
        .await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(header(&response, &CONTENT_LENGTH), None);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_if_modified_since() {
        let response = get(&[(IF_MODIFIED_SINCE.as_str(), "Thu, 29 Feb 2024 12:00:00 GMT")]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn tagged_head() -> ResponseHead {
        let mut head = ResponseHead::new();
        head.set_header(ETAG, "\"v1\"");
        head
    }

    #[tokio::test]
    async fn test_if_none_match() {
        let req = parts(Method::GET, &[(IF_NONE_MATCH.as_str(), "\"v0\", \"v1\"")]);
        let response = serve(&req, tagged_head(), "data.txt", ContentOptions::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(header(&response, &CONTENT_TYPE), None);
        assert_eq!(header(&response, &CONTENT_LENGTH), None);
        assert_eq!(header(&response, &ETAG), Some("\"v1\""));
        assert!(body_bytes(response).await.is_empty());

        let req = parts(Method::GET, &[(IF_NONE_MATCH.as_str(), "\"v0\"")]);
        let response = serve(&req, tagged_head(), "data.txt", ContentOptions::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &ETAG), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_if_range() {
        let req = parts(
            Method::GET,
            &[(RANGE.as_str(), "bytes=0-9"), (IF_RANGE.as_str(), "\"v1\"")],
        );
        let response = serve(&req, tagged_head(), "data.txt", ContentOptions::default()).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

        let req = parts(
            Method::GET,
            &[(RANGE.as_str(), "bytes=0-9"), (IF_RANGE.as_str(), "\"old\"")],
        );
        let response = serve(&req, tagged_head(), "data.txt", ContentOptions::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.len(), 100);
    }

    #[tokio::test]
    async fn test_head_has_headers_only() {
        let req = parts(Method::HEAD, &[]);
        let response = serve(
            &req,
            ResponseHead::new(),
            "data.txt",
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("100"));
        assert!(body_bytes(response).await.is_empty());

        let req = parts(Method::HEAD, &[(RANGE.as_str(), "bytes=0-1,5-6")]);
        let response = serve(
            &req,
            ResponseHead::new(),
            "data.txt",
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert!(header(&response, &CONTENT_LENGTH).is_some());
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_sniffed_type_keeps_full_body() {
        let html = b"<html><body>hi</body></html>".to_vec();
        let size = html.len() as u64;
        let req = parts(Method::GET, &[]);
        let response = serve_content(
            &req,
            ResponseHead::new(),
            "page",
            None,
            move || Ok(size),
            Cursor::new(html.clone()),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(header(&response, &CONTENT_TYPE), Some("text/html; charset=utf-8"));
        assert_eq!(header(&response, &LAST_MODIFIED), None);
        assert_eq!(body_bytes(response).await, html);
    }

    #[tokio::test]
    async fn test_preset_headers_respected() {
        let mut head = ResponseHead::new();
        head.set_header(CONTENT_TYPE, "application/x-custom");
        head.set_header(CONTENT_ENCODING, "gzip");
        let response = serve(
            &parts(Method::GET, &[]),
            head,
            "data.txt",
            ContentOptions::default(),
        )
        .await;
        assert_eq!(header(&response, &CONTENT_TYPE), Some("application/x-custom"));
        assert_eq!(header(&response, &CONTENT_LENGTH), None);
        assert_eq!(header(&response, &ACCEPT_RANGES), Some("bytes"));
        assert_eq!(body_bytes(response).await.len(), 100);
    }

    #[tokio::test]
    async fn test_size_failure() {
        let req = parts(Method::GET, &[]);
        let response = serve_content(
            &req,
            ResponseHead::new(),
            "data.txt",
            None,
            || Err(io::Error::other("stat failed")),
            Cursor::new(data()),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    /// Source that reads but cannot seek
    struct Unseekable(Cursor<Vec<u8>>);

    impl AsyncRead for Unseekable {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncSeek for Unseekable {
        fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
            Err(io::Error::other("seek refused"))
        }

        fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Poll::Ready(Ok(0))
        }
    }

    #[tokio::test]
    async fn test_seek_failure_is_server_error() {
        let req = parts(Method::GET, &[]);
        let response = serve_content(
            &req,
            ResponseHead::new(),
            "no-extension",
            None,
            || Ok(100),
            Unseekable(Cursor::new(data())),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let req = parts(Method::GET, &[(RANGE.as_str(), "bytes=5-9")]);
        let response = serve_content(
            &req,
            ResponseHead::new(),
            "data.txt",
            None,
            || Ok(100),
            Unseekable(Cursor::new(data())),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_short_source_fails_body() {
        let req = parts(Method::GET, &[]);
        let response = serve_content(
            &req,
            ResponseHead::new(),
            "data.txt",
            None,
            || Ok(500),
            Cursor::new(data()),
            ContentOptions::default(),
        )
        .await;
        assert_eq!(header(&response, &CONTENT_LENGTH), Some("500"));
        assert!(response.into_body().collect().await.is_err());
    }
}
