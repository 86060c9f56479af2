//! Streaming body adapters.
//!
//! Wrap a stream of body chunks so every chunk passes through a content
//! coder on the fly, for bodies that are never fully buffered.
//!
//! ```rust,ignore
//! let encoder = registry.encoder("br").unwrap().create(None)?;
//! let compressed = EncodedStream::new(body_stream, encoder);
//! ```

use crate::coding::{ContentDecoder, ContentEncoder};
use crate::CodingError;
use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// A chunk transform driven by [`CodedStream`].
pub trait Transcoder: Send {
    /// Transform one chunk.
    fn push(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError>;

    /// End the transform, returning trailing output.
    fn end(self) -> Result<Bytes, CodingError>;
}

impl Transcoder for Box<dyn ContentEncoder> {
    fn push(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError> {
        self.write(chunk)
    }

    fn end(self) -> Result<Bytes, CodingError> {
        self.finish()
    }
}

impl Transcoder for Box<dyn ContentDecoder> {
    fn push(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError> {
        self.write(chunk)
    }

    fn end(self) -> Result<Bytes, CodingError> {
        self.finish()
    }
}

/// Stream of chunks transformed through a coder.
///
/// Empty intermediate outputs are skipped. After the first error the stream
/// ends.
pub struct CodedStream<S, T> {
    inner: S,
    coder: Option<T>,
}

/// Response body compressed on the fly.
pub type EncodedStream<S> = CodedStream<S, Box<dyn ContentEncoder>>;

/// Request body decompressed on the fly.
pub type DecodedStream<S> = CodedStream<S, Box<dyn ContentDecoder>>;

impl<S, T> CodedStream<S, T> {
    pub fn new(inner: S, coder: T) -> Self {
        Self {
            inner,
            coder: Some(coder),
        }
    }

    /// Whether the coder has finished or failed.
    pub fn is_terminated(&self) -> bool {
        self.coder.is_none()
    }
}

impl<S, T> Stream for CodedStream<S, T>
where
    S: Stream<Item = Result<Bytes, CodingError>> + Unpin,
    T: Transcoder + Unpin,
{
    type Item = Result<Bytes, CodingError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if this.coder.is_none() {
                return Poll::Ready(None);
            }

            let result = match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(chunk)) => match this.coder.as_mut() {
                    Some(coder) => coder.push(&chunk),
                    None => return Poll::Ready(None),
                },
                Some(Err(e)) => Err(e),
                None => {
                    let tail = match this.coder.take() {
                        Some(coder) => coder.end(),
                        None => return Poll::Ready(None),
                    };
                    return Poll::Ready(match tail {
                        Ok(bytes) if bytes.is_empty() => None,
                        other => Some(other),
                    });
                }
            };

            match result {
                Ok(bytes) if bytes.is_empty() => continue,
                Ok(bytes) => return Poll::Ready(Some(Ok(bytes))),
                Err(e) => {
                    this.coder = None;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}
