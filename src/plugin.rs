//! The brok plugin

use crate::decoder::BrotliDecoderFactory;
use crate::encoder::BrotliEncoderFactory;
use crate::{BrokError, BrokOptions, ENCODING};
use brok_core::{Plugin, Server};
use serde_json::Value;
use tracing::{debug, info};

/// Plugin name used for registration
pub const PLUGIN_NAME: &str = "brok";

/// Brotli content coding for a [`Server`].
///
/// Holds validated options. The encoder and decoder factories it hands out
/// are independent values; [`Brok::install`] or the [`Plugin`] impl put them
/// in a server's coding registry under `"br"`.
///
/// ```
/// use brok::Brok;
/// use brok_core::Server;
/// use serde_json::json;
///
/// let mut server = Server::new();
/// server.register(&Brok::default(), json!({ "decompress": true })).unwrap();
///
/// assert!(server.registry().has_encoder("br"));
/// assert!(server.registry().has_decoder("br"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Brok {
    options: BrokOptions,
}

impl Brok {
    /// Validate `options` and build the plugin
    pub fn new(options: BrokOptions) -> Result<Self, BrokError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Build the plugin from untyped options
    pub fn from_value(options: Value) -> Result<Self, BrokError> {
        Ok(Self {
            options: BrokOptions::from_value(options)?,
        })
    }

    pub fn options(&self) -> &BrokOptions {
        &self.options
    }

    /// The encoder factory, unless compression is disabled
    pub fn encoder_factory(&self) -> Option<BrotliEncoderFactory> {
        // options were validated when the plugin was built
        self.options.compress.map(BrotliEncoderFactory::validated)
    }

    /// The decoder factory, if decompression is enabled
    pub fn decoder_factory(&self) -> Option<BrotliDecoderFactory> {
        self.options.decompress.then(BrotliDecoderFactory::new)
    }

    pub fn into_parts(self) -> (Option<BrotliEncoderFactory>, Option<BrotliDecoderFactory>) {
        (self.encoder_factory(), self.decoder_factory())
    }

    /// Register the factories with `server`.
    ///
    /// Fails if the server already has a `br` encoder or decoder.
    pub fn install(&self, server: &mut Server) -> Result<(), BrokError> {
        let (encoder, decoder) = self.clone().into_parts();

        if let Some(factory) = encoder {
            let params = factory.params();
            server.encoder(ENCODING, factory)?;
            debug!(mode = %params.mode, quality = params.quality, "Brotli encoder registered");
        }

        if let Some(factory) = decoder {
            server.decoder(ENCODING, factory)?;
            debug!("Brotli decoder registered");
        }

        info!(
            compress = self.options.compress.is_some(),
            decompress = self.options.decompress,
            "brok installed"
        );
        Ok(())
    }
}

impl Plugin for Brok {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// `options` set to `null` keeps the options the plugin was built
    /// with; anything else replaces them after validation.
    fn register(&self, server: &mut Server, options: Value) -> Result<(), brok_core::Error> {
        if options.is_null() {
            return self.install(server).map_err(Into::into);
        }

        Brok::from_value(options)?
            .install(server)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompressionMode, EncodeParams};
    use serde_json::json;

    #[test]
    fn test_capabilities_follow_options() {
        let brok = Brok::default();
        assert_eq!(
            brok.encoder_factory().unwrap().params(),
            EncodeParams::default()
        );
        assert!(brok.decoder_factory().is_none());

        let options = BrokOptions::builder()
            .disable_compression()
            .decompress(true)
            .build()
            .unwrap();
        let (encoder, decoder) = Brok::new(options).unwrap().into_parts();
        assert!(encoder.is_none());
        assert!(decoder.is_some());
    }

    #[test]
    fn test_new_validates() {
        let options = BrokOptions {
            compress: Some(EncodeParams::new(CompressionMode::Text, 99)),
            decompress: false,
        };
        let err = Brok::new(options).unwrap_err();
        assert_eq!(err.field(), Some("compress.quality"));
    }

    #[test]
    fn test_register_with_raw_options() {
        let mut server = Server::new();
        server
            .register(&Brok::default(), json!({ "compress": false, "decompress": true }))
            .unwrap();

        assert!(!server.registry().has_encoder("br"));
        assert!(server.registry().has_decoder("br"));
        assert_eq!(server.plugins()[0].name, "brok");
        assert_eq!(server.plugins()[0].version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_register_null_uses_built_options() {
        let brok = Brok::new(BrokOptions::builder().decompress(true).build().unwrap()).unwrap();
        let mut server = Server::new();
        server.register(&brok, Value::Null).unwrap();

        assert!(server.registry().has_encoder("br"));
        assert!(server.registry().has_decoder("br"));
    }

    #[test]
    fn test_invalid_options_fail_registration() {
        let mut server = Server::new();
        let err = server
            .register(&Brok::default(), json!({ "compress": { "quality": 3.4 } }))
            .unwrap_err();

        assert!(err.to_string().contains("compress.quality"));
        assert!(server.plugins().is_empty());
        assert!(!server.registry().has_encoder("br"));
    }

    #[test]
    fn test_double_registration_fails() {
        let mut server = Server::new();
        server.register(&Brok::default(), Value::Null).unwrap();
        assert!(server.register(&Brok::default(), Value::Null).is_err());
    }

    #[test]
    fn test_install_refuses_existing_encoder() {
        let mut server = Server::new();
        Brok::default().install(&mut server).unwrap();
        let err = Brok::default().install(&mut server).unwrap_err();
        assert!(matches!(err, BrokError::Host(_)));
    }
}
