//! Brotli request decoder

use crate::ENCODING;
use brok_core::{CodingError, ContentDecoder, DecoderFactory};
use brotli::DecompressorWriter;
use bytes::Bytes;
use std::io::{self, Write};
use tracing::{debug, trace};

/// Internal buffer size of the decompressor
pub const BUFFER_SIZE: usize = 4096;

/// Builds a fresh [`BrotliDecoder`] per request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrotliDecoderFactory;

impl BrotliDecoderFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn decoder(&self) -> BrotliDecoder {
        trace!("Creating brotli decoder");
        BrotliDecoder::new()
    }
}

impl DecoderFactory for BrotliDecoderFactory {
    fn create(&self) -> Result<Box<dyn ContentDecoder>, CodingError> {
        Ok(Box::new(self.decoder()))
    }
}

/// Decompressor sink that refuses output past a byte limit
#[derive(Debug)]
struct OutputSink {
    buf: Vec<u8>,
    written: usize,
    limit: usize,
    exceeded: bool,
}

impl OutputSink {
    fn new() -> Self {
        Self {
            buf: Vec::new(),
            written: 0,
            limit: usize::MAX,
            exceeded: false,
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.written.saturating_add(data.len()) > self.limit {
            self.exceeded = true;
            return Err(io::Error::other("decoded output limit reached"));
        }
        self.written += data.len();
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Streaming Brotli decompressor for one body.
///
/// Invalid input fails on `write`; a stream that stops before its last
/// meta-block fails on `finish`. Both surface as [`CodingError::Corrupt`].
/// Output past the limit set by [`ContentDecoder::limit_output`] fails
/// with [`CodingError::TooLarge`] before it is buffered.
pub struct BrotliDecoder {
    writer: DecompressorWriter<OutputSink>,
}

impl BrotliDecoder {
    pub fn new() -> Self {
        Self {
            writer: DecompressorWriter::new(OutputSink::new(), BUFFER_SIZE),
        }
    }

    fn take_output(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.writer.get_mut().buf))
    }

    fn too_large(limit: usize) -> CodingError {
        debug!(limit, "Brotli payload exceeds output limit");
        CodingError::TooLarge {
            encoding: ENCODING,
            limit,
        }
    }
}

impl Default for BrotliDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BrotliDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrotliDecoder").finish_non_exhaustive()
    }
}

fn corrupt(reason: impl Into<String>) -> CodingError {
    CodingError::Corrupt {
        encoding: ENCODING,
        reason: reason.into(),
    }
}

impl ContentDecoder for BrotliDecoder {
    fn encoding(&self) -> &'static str {
        ENCODING
    }

    fn write(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError> {
        if let Err(e) = self.writer.write_all(chunk) {
            let sink = self.writer.get_mut();
            if sink.exceeded {
                return Err(Self::too_large(sink.limit));
            }
            debug!(error = %e, "Rejecting brotli input");
            return Err(corrupt(e.to_string()));
        }
        Ok(self.take_output())
    }

    fn finish(self: Box<Self>) -> Result<Bytes, CodingError> {
        match self.writer.into_inner() {
            Ok(sink) if !sink.exceeded => Ok(Bytes::from(sink.buf)),
            Ok(sink) => Err(Self::too_large(sink.limit)),
            Err(sink) if sink.exceeded => Err(Self::too_large(sink.limit)),
            Err(_) => {
                debug!("Brotli stream ended early");
                Err(corrupt("unexpected end of stream"))
            }
        }
    }

    fn limit_output(&mut self, max_bytes: usize) {
        self.writer.get_mut().limit = max_bytes;
    }
}
