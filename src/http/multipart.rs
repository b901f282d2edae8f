//! `multipart/byteranges` encoding
//!
//! The framing is generated by the same functions for both the size
//! computation and the streamed body, so the declared `Content-Length`
//! always equals the bytes emitted.

use super::body::ServeBody;
use super::range::ByteRange;
use crate::logger;
use hyper::body::Bytes;
use std::collections::hash_map::RandomState;
use std::fmt::Write as _;
use std::hash::{BuildHasher, Hasher};
use std::io::{self, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio::sync::mpsc;

const IO_BUFFER_SIZE: usize = 32 * 1024;

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

type ChunkSender = mpsc::Sender<io::Result<Bytes>>;

/// A multi-range response body description
#[derive(Debug, Clone)]
pub struct MultipartRanges {
    ranges: Vec<ByteRange>,
    content_type: String,
    size: u64,
    boundary: String,
}

impl MultipartRanges {
    pub fn new(ranges: Vec<ByteRange>, content_type: &str, size: u64) -> Self {
        Self::with_boundary(ranges, content_type, size, generate_boundary())
    }

    pub fn with_boundary(
        ranges: Vec<ByteRange>,
        content_type: &str,
        size: u64,
        boundary: String,
    ) -> Self {
        Self {
            ranges,
            content_type: content_type.to_string(),
            size,
            boundary,
        }
    }

    /// Value for the response `Content-Type` header
    pub fn content_type_header(&self) -> String {
        format!("multipart/byteranges; boundary={}", self.boundary)
    }

    /// Opening delimiter and MIME headers of part `index`
    fn part_header(&self, index: usize) -> String {
        let range = &self.ranges[index];
        let mut header = String::new();
        if index > 0 {
            header.push_str("\r\n");
        }
        let _ = write!(
            header,
            "--{}\r\nContent-Range: {}\r\nContent-Type: {}\r\n\r\n",
            self.boundary,
            range.content_range(self.size),
            self.content_type
        );
        header
    }

    fn closing_delimiter(&self) -> String {
        format!("\r\n--{}--\r\n", self.boundary)
    }

    /// Exact number of bytes the encoded body will contain
    pub fn encoded_size(&self) -> u64 {
        let framing: usize = (0..self.ranges.len())
            .map(|i| self.part_header(i).len())
            .sum::<usize>()
            + self.closing_delimiter().len();
        self.ranges
            .iter()
            .fold(framing as u64, |acc, r| acc + r.length)
    }

    /// Stream the encoded body, reading each range from `content` in request order
    ///
    /// A producer task writes into a single-slot channel, so it runs at most one
    /// chunk ahead of the consumer. Dropping the returned body makes the
    /// producer stop at its next send and release `content`.
    pub fn into_body<R>(self, content: R) -> ServeBody
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let length = self.encoded_size();
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            match self.write_parts(content, &tx).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    logger::log_warning(&format!("Multipart range stream aborted: {e}"));
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        ServeBody::channel(rx, length)
    }

    async fn write_parts<R>(&self, mut content: R, tx: &ChunkSender) -> io::Result<()>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let mut buffer = vec![0u8; IO_BUFFER_SIZE];

        for (index, range) in self.ranges.iter().enumerate() {
            send(tx, Bytes::from(self.part_header(index))).await?;
            content.seek(SeekFrom::Start(range.start)).await?;

            let mut remaining = range.length;
            while remaining > 0 {
                let want = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
                let n = content.read(&mut buffer[..want]).await?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("content ended inside range {}", range.content_range(self.size)),
                    ));
                }
                send(tx, Bytes::copy_from_slice(&buffer[..n])).await?;
                remaining -= n as u64;
            }
        }

        send(tx, Bytes::from(self.closing_delimiter())).await
    }
}

async fn send(tx: &ChunkSender, chunk: Bytes) -> io::Result<()> {
    tx.send(Ok(chunk))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
}

/// Random 32-hex-digit boundary
fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let counter = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut boundary = String::with_capacity(32);
    for word in 0..2u64 {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u128(nanos);
        hasher.write_u64(counter);
        hasher.write_u64(word);
        let _ = write!(boundary, "{:016x}", hasher.finish());
    }
    boundary
}
