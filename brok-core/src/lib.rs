//! Plugin host for brok.
//!
//! A small in-process HTTP pipeline that plugins extend with routes,
//! middleware and named content codings. Requests go through
//! [`Server::inject`], which handles `Content-Encoding` on the way in and
//! `Accept-Encoding` on the way out using whatever codings are registered.
//!
//! ```
//! use brok_core::*;
//!
//! # tokio_test::block_on(async {
//! let mut server = Server::new();
//! server.route(Route::get("/", |_req| async { Ok(HttpResponse::text("hello")) }));
//!
//! let response = server.inject(HttpRequest::get("/")).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body_text(), "hello");
//! # });
//! ```

pub mod coding;
pub mod content_negotiation;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod plugin;
pub mod routing;
pub mod server;
pub mod streaming;

pub use coding::{
    CodingRegistry, ContentDecoder, ContentEncoder, DecoderFactory, EncoderFactory,
    FnDecoderFactory, FnEncoderFactory, decode_all, decode_all_limited, decoder_fn, encode_all,
    encoder_fn,
};
pub use content_negotiation::{AcceptEncoding, IDENTITY, negotiate_encoding};
pub use error::{CodingError, Error, reason_phrase};
pub use http::{HttpRequest, HttpResponse};
pub use middleware::{HandlerFn, HandlerFuture, LoggerMiddleware, Middleware, MiddlewareChain, Next};
pub use plugin::{Plugin, PluginInfo};
pub use routing::{HttpMethod, Route, RouteConfig, Router};
pub use server::{CompressionSettings, PayloadSettings, Server, ServerConfig};
pub use streaming::{CodedStream, DecodedStream, EncodedStream, Transcoder};

/// Result type for host operations
pub type Result<T> = std::result::Result<T, Error>;
