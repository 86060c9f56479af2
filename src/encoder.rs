//! Brotli response encoder
//!
//! The factory holds only the validated [`EncodeParams`]; every
//! [`EncoderFactory::create`] call builds a fresh `brotli::CompressorWriter`,
//! so concurrent responses never share codec state.

use crate::options::{EncodeOverrides, EncodeParams};
use crate::{BrokError, ENCODING};
use brok_core::{CodingError, ContentEncoder, EncoderFactory};
use brotli::CompressorWriter;
use brotli::enc::BrotliEncoderParams;
use bytes::Bytes;
use serde_json::Value;
use std::io::Write;
use tracing::debug;

/// Internal buffer size of the compressor
pub const BUFFER_SIZE: usize = 4096;

/// Builds [`BrotliEncoder`]s from static parameters plus per-call overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrotliEncoderFactory {
    params: EncodeParams,
}

impl BrotliEncoderFactory {
    /// Validate `params` and build the factory
    pub fn new(params: EncodeParams) -> Result<Self, BrokError> {
        params.validate("compress")?;
        Ok(Self::validated(params))
    }

    /// `params` must already have passed validation.
    pub(crate) fn validated(params: EncodeParams) -> Self {
        Self { params }
    }

    /// The statically configured parameters
    pub fn params(&self) -> EncodeParams {
        self.params
    }

    /// Build an encoder with `overrides` merged over the static parameters
    pub fn encoder(&self, overrides: Option<&Value>) -> Result<BrotliEncoder, BrokError> {
        let overrides = EncodeOverrides::from_value(overrides)?;
        let params = self.params.merge(&overrides);
        debug!(
            mode = %params.mode,
            quality = params.quality,
            overridden = !overrides.is_empty(),
            "Creating brotli encoder"
        );
        Ok(BrotliEncoder::build(params))
    }
}

impl Default for BrotliEncoderFactory {
    fn default() -> Self {
        Self::validated(EncodeParams::default())
    }
}

impl EncoderFactory for BrotliEncoderFactory {
    fn create(&self, options: Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError> {
        let encoder = self
            .encoder(options)
            .map_err(|e| CodingError::InvalidOptions {
                encoding: ENCODING,
                reason: e.to_string(),
            })?;
        Ok(Box::new(encoder))
    }
}

/// Streaming Brotli compressor for one body
pub struct BrotliEncoder {
    params: EncodeParams,
    writer: CompressorWriter<Vec<u8>>,
}

impl BrotliEncoder {
    /// Validate `params` and build the encoder
    pub fn new(params: EncodeParams) -> Result<Self, BrokError> {
        params.validate("compress")?;
        Ok(Self::build(params))
    }

    fn build(params: EncodeParams) -> Self {
        let native = BrotliEncoderParams {
            mode: params.mode.native(),
            quality: params.quality as i32,
            ..Default::default()
        };
        Self {
            params,
            writer: CompressorWriter::with_params(Vec::new(), BUFFER_SIZE, &native),
        }
    }

    /// The effective parameters after overrides
    pub fn params(&self) -> EncodeParams {
        self.params
    }

    fn take_output(&mut self) -> Bytes {
        Bytes::from(std::mem::take(self.writer.get_mut()))
    }
}

impl std::fmt::Debug for BrotliEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrotliEncoder")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ContentEncoder for BrotliEncoder {
    fn encoding(&self) -> &'static str {
        ENCODING
    }

    fn write(&mut self, chunk: &[u8]) -> Result<Bytes, CodingError> {
        self.writer.write_all(chunk)?;
        Ok(self.take_output())
    }

    fn flush(&mut self) -> Result<Bytes, CodingError> {
        self.writer.flush()?;
        Ok(self.take_output())
    }

    fn finish(self: Box<Self>) -> Result<Bytes, CodingError> {
        // into_inner emits the final meta-block
        Ok(Bytes::from(self.writer.into_inner()))
    }
}
