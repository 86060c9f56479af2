//! Content-coding registry.
//!
//! Plugins install named encoders and decoders here; the server pipeline
//! looks them up per request. An encoder or decoder is a chunked transform:
//! bytes go in through [`ContentEncoder::write`], transformed bytes come
//! out, and [`ContentEncoder::finish`] emits whatever the coder still holds.
//! Every request gets its own coder from the registered factory.

use crate::content_negotiation::IDENTITY;
use crate::{CodingError, Error};
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Default chunk size used when piping a buffered body through a coder.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Streaming compressor for one response body.
pub trait ContentEncoder: Send {
    /// The `Content-Encoding` token this encoder produces.
    fn encoding(&self) -> &'static str;

    /// Feed a chunk, returning any output produced so far (may be empty).
    fn write(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError>;

    /// Force buffered output out without ending the stream.
    fn flush(&mut self) -> Result<Bytes, CodingError>;

    /// End the stream and return the remaining output.
    fn finish(self: Box<Self>) -> Result<Bytes, CodingError>;
}

/// Streaming decompressor for one request body.
pub trait ContentDecoder: Send {
    /// The `Content-Encoding` token this decoder accepts.
    fn encoding(&self) -> &'static str;

    /// Feed a chunk of encoded input, returning decoded output so far.
    fn write(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError>;

    /// Check the stream ended cleanly and return the remaining output.
    fn finish(self: Box<Self>) -> Result<Bytes, CodingError>;

    /// Cap the total decoded output at `max_bytes`.
    ///
    /// Decoders that can stop mid-chunk should fail with
    /// [`CodingError::TooLarge`] as soon as the cap is passed. The default
    /// does nothing; [`decode_all_limited`] still checks between chunks.
    fn limit_output(&mut self, max_bytes: usize) {
        let _ = max_bytes;
    }
}

/// Builds encoders. `options` carries per-route overrides, if any.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, options: Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError>;
}

/// Builds decoders.
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn ContentDecoder>, CodingError>;
}

/// Adapter turning a closure into an [`EncoderFactory`].
pub struct FnEncoderFactory<F>(F);

/// Wrap a closure as an encoder factory.
pub fn encoder_fn<F>(f: F) -> FnEncoderFactory<F>
where
    F: Fn(Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError> + Send + Sync,
{
    FnEncoderFactory(f)
}

impl<F> EncoderFactory for FnEncoderFactory<F>
where
    F: Fn(Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError> + Send + Sync,
{
    fn create(&self, options: Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError> {
        (self.0)(options)
    }
}

/// Adapter turning a closure into a [`DecoderFactory`].
pub struct FnDecoderFactory<F>(F);

/// Wrap a closure as a decoder factory.
pub fn decoder_fn<F>(f: F) -> FnDecoderFactory<F>
where
    F: Fn() -> Result<Box<dyn ContentDecoder>, CodingError> + Send + Sync,
{
    FnDecoderFactory(f)
}

impl<F> DecoderFactory for FnDecoderFactory<F>
where
    F: Fn() -> Result<Box<dyn ContentDecoder>, CodingError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn ContentDecoder>, CodingError> {
        (self.0)()
    }
}

/// Named encoder and decoder factories.
///
/// Encoders keep registration order, which breaks ties during negotiation.
#[derive(Clone, Default)]
pub struct CodingRegistry {
    encoders: Vec<(String, Arc<dyn EncoderFactory>)>,
    decoders: HashMap<String, Arc<dyn DecoderFactory>>,
}

fn normalize(name: &str) -> Result<String, Error> {
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() || name == IDENTITY || name == "*" {
        return Err(Error::Registration(format!(
            "Invalid content encoding name: {:?}",
            name
        )));
    }
    Ok(name)
}

impl CodingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encoder. Existing names cannot be overridden.
    pub fn register_encoder<F>(&mut self, name: &str, factory: F) -> Result<(), Error>
    where
        F: EncoderFactory + 'static,
    {
        let name = normalize(name)?;
        if self.encoder(&name).is_some() {
            return Err(Error::Registration(format!(
                "Cannot override existing encoder for {}",
                name
            )));
        }
        self.encoders.push((name, Arc::new(factory)));
        Ok(())
    }

    /// Register a decoder. Existing names cannot be overridden.
    pub fn register_decoder<F>(&mut self, name: &str, factory: F) -> Result<(), Error>
    where
        F: DecoderFactory + 'static,
    {
        let name = normalize(name)?;
        if self.decoders.contains_key(&name) {
            return Err(Error::Registration(format!(
                "Cannot override existing decoder for {}",
                name
            )));
        }
        self.decoders.insert(name, Arc::new(factory));
        Ok(())
    }

    pub fn encoder(&self, name: &str) -> Option<Arc<dyn EncoderFactory>> {
        self.encoders
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, f)| f.clone())
    }

    pub fn decoder(&self, name: &str) -> Option<Arc<dyn DecoderFactory>> {
        self.decoders.get(&name.trim().to_ascii_lowercase()).cloned()
    }

    /// Encoder names in registration order
    pub fn encoder_names(&self) -> Vec<&str> {
        self.encoders.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoder(name).is_some()
    }

    pub fn has_decoder(&self, name: &str) -> bool {
        self.decoder(name).is_some()
    }
}

impl fmt::Debug for CodingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decoders: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        decoders.sort_unstable();
        f.debug_struct("CodingRegistry")
            .field("encoders", &self.encoder_names())
            .field("decoders", &decoders)
            .finish()
    }
}

/// Pipe a buffered body through an encoder in `chunk_size` pieces.
pub fn encode_all(
    mut encoder: Box<dyn ContentEncoder>,
    body: &[u8],
    chunk_size: usize,
) -> Result<Vec<u8>, CodingError> {
    let mut output = Vec::with_capacity(body.len() / 2 + 16);
    for chunk in body.chunks(chunk_size.max(1)) {
        output.extend_from_slice(&encoder.write(chunk)?);
    }
    output.extend_from_slice(&encoder.finish()?);
    Ok(output)
}

/// Pipe a buffered body through a decoder in `chunk_size` pieces.
pub fn decode_all(
    decoder: Box<dyn ContentDecoder>,
    body: &[u8],
    chunk_size: usize,
) -> Result<Vec<u8>, CodingError> {
    decode_all_limited(decoder, body, chunk_size, usize::MAX)
}

/// Like [`decode_all`], failing once decoded output passes `max_bytes`.
pub fn decode_all_limited(
    mut decoder: Box<dyn ContentDecoder>,
    body: &[u8],
    chunk_size: usize,
    max_bytes: usize,
) -> Result<Vec<u8>, CodingError> {
    let encoding = decoder.encoding();
    decoder.limit_output(max_bytes);

    let mut output = Vec::with_capacity(body.len().saturating_mul(2).min(max_bytes));
    let push = |output: &mut Vec<u8>, bytes: Bytes| {
        if output.len().saturating_add(bytes.len()) > max_bytes {
            return Err(CodingError::TooLarge {
                encoding,
                limit: max_bytes,
            });
        }
        output.extend_from_slice(&bytes);
        Ok(())
    };

    for chunk in body.chunks(chunk_size.max(1)) {
        push(&mut output, decoder.write(chunk)?)?;
    }
    push(&mut output, decoder.finish()?)?;
    Ok(output)
}
