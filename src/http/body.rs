//! Response body module
//!
//! A single body type covers every response shape the server produces:
//! empty heads, small in-memory pages, a bounded window of a file, and the
//! multipart stream fed by a producer task.

use hyper::body::{Body, Bytes, Frame, SizeHint};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Boxed readable content source
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Response body
pub enum ServeBody {
    /// No payload (HEAD, 304, redirects without body)
    Empty,
    /// In-memory payload, taken on first poll
    Full(Option<Bytes>),
    /// Exactly `remaining` bytes copied from `reader`
    Limited(LimitedReader),
    /// Chunks produced by another task through a bounded channel
    Channel {
        rx: mpsc::Receiver<io::Result<Bytes>>,
        length: Option<u64>,
    },
}

impl ServeBody {
    pub const fn empty() -> Self {
        Self::Empty
    }

    pub fn full(data: impl Into<Bytes>) -> Self {
        Self::Full(Some(data.into()))
    }

    pub fn limited(reader: BoxedReader, length: u64) -> Self {
        Self::Limited(LimitedReader::new(reader, length))
    }

    pub const fn channel(rx: mpsc::Receiver<io::Result<Bytes>>, length: u64) -> Self {
        Self::Channel {
            rx,
            length: Some(length),
        }
    }

    /// Stop advertising an exact length, so hyper does not derive a
    /// `Content-Length` from the size hint
    #[must_use]
    pub fn undeclared(mut self) -> Self {
        match &mut self {
            Self::Limited(reader) => reader.declared = false,
            Self::Channel { length, .. } => *length = None,
            Self::Empty | Self::Full(_) => {}
        }
        self
    }
}

/// Reader adapter that yields exactly `length` bytes or fails
///
/// A source ending before `length` bytes is an error rather than a short body:
/// the declared `Content-Length` has already been sent.
pub struct LimitedReader {
    reader: BoxedReader,
    remaining: u64,
    buffer: Vec<u8>,
    declared: bool,
}

impl LimitedReader {
    fn new(reader: BoxedReader, length: u64) -> Self {
        let capacity = usize::try_from(length).map_or(IO_BUFFER_SIZE, |l| l.min(IO_BUFFER_SIZE));
        Self {
            reader,
            remaining: length,
            buffer: vec![0; capacity],
            declared: true,
        }
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        if self.remaining == 0 {
            return Poll::Ready(None);
        }

        // the smaller of the buffer size and the number of bytes remaining
        let nbytes = usize::try_from(self.remaining)
            .map_or(self.buffer.len(), |r| r.min(self.buffer.len()));
        let mut read_buf = ReadBuf::new(&mut self.buffer[..nbytes]);

        match Pin::new(&mut self.reader).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    self.remaining = 0;
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "content ended before declared length",
                    ))));
                }
                let chunk = Bytes::copy_from_slice(filled);
                self.remaining -= chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
        }
    }
}

impl Body for ServeBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let chunk = match self.get_mut() {
            Self::Empty => Poll::Ready(None),
            Self::Full(data) => Poll::Ready(data.take().map(Ok)),
            Self::Limited(reader) => reader.poll_chunk(cx),
            Self::Channel { rx, .. } => rx.poll_recv(cx),
        };
        chunk.map(|item| item.map(|result| result.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(data) => data.as_ref().is_none_or(Bytes::is_empty),
            Self::Limited(reader) => reader.remaining == 0,
            Self::Channel { .. } => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Self::Empty => SizeHint::with_exact(0),
            Self::Full(data) => SizeHint::with_exact(data.as_ref().map_or(0, |d| d.len() as u64)),
            Self::Limited(reader) if reader.declared => SizeHint::with_exact(reader.remaining),
            Self::Channel {
                length: Some(length),
                ..
            } => SizeHint::with_exact(*length),
            Self::Limited(_) | Self::Channel { .. } => SizeHint::default(),
        }
    }
}
