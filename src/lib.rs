//! Brotli content coding for the brok server host.
//!
//! Registers a `br` encoder (response compression) and, optionally, a `br`
//! decoder (request decompression) with a [`brok_core::Server`]. The host
//! picks the encoder through `Accept-Encoding` negotiation and the decoder
//! from a request's `Content-Encoding`.
//!
//! # Options
//!
//! | Option | Type | Default |
//! |---|---|---|
//! | `compress` | `false` or `{ mode, quality }` | `{ mode: "generic", quality: 5 }` |
//! | `compress.mode` | `"generic"` or `"text"` | `"generic"` |
//! | `compress.quality` | integer `0..=11` | `5` |
//! | `decompress` | boolean | `false` |
//!
//! Routes may override `mode` and `quality` per encoding through
//! [`RouteConfig::compression`](brok_core::RouteConfig::compression).
//!
//! # Example
//!
//! ```
//! use brok::Brok;
//! use brok_core::{HttpRequest, HttpResponse, Route, Server, ServerConfig};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut server = Server::with_config(ServerConfig::new().min_bytes(1));
//! server.register(&Brok::default(), json!({ "compress": { "mode": "text" } })).unwrap();
//! server.route(Route::get("/", |_req| async { Ok(HttpResponse::text("compressable")) }));
//!
//! let response = server
//!     .inject(HttpRequest::get("/").with_header("Accept-Encoding", "br"))
//!     .await;
//! assert_eq!(response.header("Content-Encoding").map(String::as_str), Some("br"));
//! # });
//! ```

#[cfg(feature = "config")]
pub mod config;
pub mod decoder;
pub mod encoder;
mod error;
pub mod mode;
pub mod options;
mod plugin;

pub use decoder::{BrotliDecoder, BrotliDecoderFactory};
pub use encoder::{BrotliEncoder, BrotliEncoderFactory};
pub use error::BrokError;
pub use mode::CompressionMode;
pub use options::{BrokOptions, BrokOptionsBuilder, EncodeOverrides, EncodeParams};
pub use plugin::{Brok, PLUGIN_NAME};

/// The content-coding token brok registers under
pub const ENCODING: &str = "br";

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, BrokError>;
