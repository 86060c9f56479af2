//! In-process server and request pipeline.
//!
//! [`Server::inject`] runs a request through the same steps a listener
//! would: routing, inbound content decoding, payload validation, middleware
//! and handler, then outbound content encoding. Nothing touches a socket,
//! which keeps the whole lifecycle testable in-process.

use crate::coding::{
    DEFAULT_CHUNK_SIZE, DecoderFactory, EncoderFactory, decode_all_limited, encode_all,
};
use crate::content_negotiation::{AcceptEncoding, IDENTITY, negotiate_encoding};
use crate::logging::{debug, error, trace, warn};
use crate::plugin::{Plugin, PluginInfo};
use crate::{
    CodingError, CodingRegistry, Error, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Route,
    RouteConfig, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response compression settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Bodies shorter than this are sent unencoded
    pub min_bytes: usize,
    /// Size of the pieces a buffered body is fed to a coder in
    pub chunk_size: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            min_bytes: 1024,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Request payload limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadSettings {
    /// Largest request body accepted, before and after content decoding
    pub max_bytes: usize,
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub compression: CompressionSettings,
    pub payload: PayloadSettings,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_bytes(mut self, min_bytes: usize) -> Self {
        self.compression.min_bytes = min_bytes;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.compression.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the request body limit in bytes.
    pub fn max_body_bytes(mut self, max_bytes: usize) -> Self {
        self.payload.max_bytes = max_bytes;
        self
    }
}

/// Plugin host with an in-process request pipeline
///
/// Build it mutably (routes, middleware, plugins), then share it; `inject`
/// only needs `&self` and may run concurrently.
#[derive(Debug, Default)]
pub struct Server {
    config: ServerConfig,
    router: Router,
    middleware: MiddlewareChain,
    codings: CodingRegistry,
    plugins: Vec<PluginInfo>,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add a route
    pub fn route(&mut self, route: Route) -> &mut Self {
        debug!(method = route.method.as_str(), path = %route.path, "Registering route");
        self.router.add_route(route);
        self
    }

    /// Add a middleware to the chain
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.use_middleware(middleware);
        self
    }

    /// Register a response encoder under a content-coding name
    pub fn encoder<F>(&mut self, name: &str, factory: F) -> Result<(), Error>
    where
        F: EncoderFactory + 'static,
    {
        self.codings.register_encoder(name, factory)?;
        debug!(encoding = name, "Registered encoder");
        Ok(())
    }

    /// Register a request decoder under a content-coding name
    pub fn decoder<F>(&mut self, name: &str, factory: F) -> Result<(), Error>
    where
        F: DecoderFactory + 'static,
    {
        self.codings.register_decoder(name, factory)?;
        debug!(encoding = name, "Registered decoder");
        Ok(())
    }

    /// Register a plugin with its options.
    ///
    /// A plugin name can be registered once. If the plugin fails, whatever
    /// it installed before failing is rolled back.
    pub fn register<P>(&mut self, plugin: &P, options: Value) -> Result<(), Error>
    where
        P: Plugin + ?Sized,
    {
        let name = plugin.name();
        if self.plugins.iter().any(|p| p.name == name) {
            return Err(Error::Plugin(format!(
                "Plugin {} already registered",
                name
            )));
        }

        let router = self.router.clone();
        let middleware = self.middleware.clone();
        let codings = self.codings.clone();

        if let Err(e) = plugin.register(self, options) {
            self.router = router;
            self.middleware = middleware;
            self.codings = codings;
            warn!(plugin = name, error = %e, "Plugin registration failed");
            return Err(e);
        }

        debug!(plugin = name, version = plugin.version(), "Registered plugin");
        self.plugins.push(PluginInfo {
            name,
            version: plugin.version(),
        });
        Ok(())
    }

    /// Plugins registered so far, in order
    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn registry(&self) -> &CodingRegistry {
        &self.codings
    }

    /// Run a request through the full pipeline.
    ///
    /// Failures become JSON error responses; this never returns an error.
    pub async fn inject(&self, mut request: HttpRequest) -> HttpResponse {
        trace!(method = %request.method, path = %request.path, "Injecting request");

        let accept = request
            .header("Accept-Encoding")
            .map(|value| AcceptEncoding::parse(value));

        let route = match self.router.find(&mut request) {
            Ok(route) => route,
            Err(e) => return HttpResponse::from_error(&e),
        };

        if let Err(e) = self.decode_request(&mut request) {
            return HttpResponse::from_error(&e);
        }

        if let Err(e) = validate_payload(&request) {
            return HttpResponse::from_error(&e);
        }

        let response = match self.middleware.apply(request, route.handler.clone()).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_server_error() {
                    error!(error = %e, "Handler failed");
                }
                return HttpResponse::from_error(&e);
            }
        };

        match accept {
            Some(accept) => self.encode_response(response, &accept, &route.config),
            None => response,
        }
    }

    /// Undo the request's `Content-Encoding`, last coding first.
    ///
    /// Both the raw and the decoded body are held to the payload limit.
    fn decode_request(&self, request: &mut HttpRequest) -> Result<(), Error> {
        let max_bytes = self.config.payload.max_bytes;
        if request.body.len() > max_bytes {
            return Err(payload_too_large(max_bytes));
        }

        let Some(header) = request.header("Content-Encoding") else {
            return Ok(());
        };
        if request.body.is_empty() && !has_payload(&request.method) {
            trace!(method = %request.method, "Skipping decode of empty body");
            return Ok(());
        }

        let codings: Vec<String> = header
            .split(',')
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty() && c != IDENTITY)
            .collect();

        let mut body = std::mem::take(&mut request.body);
        for encoding in codings.iter().rev() {
            let Some(factory) = self.codings.decoder(encoding) else {
                debug!(%encoding, "No decoder registered");
                return Err(Error::BadRequest("Unsupported content encoding".to_string()));
            };

            body = factory
                .create()
                .and_then(|decoder| {
                    decode_all_limited(
                        decoder,
                        &body,
                        self.config.compression.chunk_size,
                        max_bytes,
                    )
                })
                .map_err(|e| match e {
                    CodingError::TooLarge { .. } => {
                        warn!(%encoding, max_bytes, "Decoded request payload too large");
                        payload_too_large(max_bytes)
                    }
                    e => {
                        warn!(%encoding, error = %e, "Failed to decode request payload");
                        Error::BadRequest("Invalid compressed payload".to_string())
                    }
                })?;
            trace!(%encoding, decoded_bytes = body.len(), "Decoded request payload");
        }

        request.body = body;
        request.remove_header("Content-Encoding");
        request.remove_header("Content-Length");
        Ok(())
    }

    /// Encode the response with the best registered coding the client accepts.
    fn encode_response(
        &self,
        mut response: HttpResponse,
        accept: &AcceptEncoding,
        config: &RouteConfig,
    ) -> HttpResponse {
        if !is_encodable(&response) {
            return response;
        }

        let available = self.codings.encoder_names();
        if available.is_empty() {
            return response;
        }
        append_vary(&mut response);

        if response.body.len() < self.config.compression.min_bytes {
            return response;
        }

        let Some(encoding) = negotiate_encoding(accept, &available) else {
            return response;
        };
        if encoding == IDENTITY {
            trace!("Client prefers identity");
            return response;
        }
        let Some(factory) = self.codings.encoder(encoding) else {
            return response;
        };

        let encoded = factory
            .create(config.compression_for(encoding))
            .and_then(|encoder| {
                encode_all(encoder, &response.body, self.config.compression.chunk_size)
            });

        match encoded {
            Ok(body) => {
                trace!(
                    %encoding,
                    original_bytes = response.body.len(),
                    encoded_bytes = body.len(),
                    "Encoded response"
                );
                response.body = body;
                response.remove_header("Content-Length");
                response
                    .headers
                    .insert("Content-Encoding".to_string(), encoding.to_string());
            }
            Err(e) => {
                warn!(%encoding, error = %e, "Failed to encode response, sending identity");
            }
        }

        response
    }
}

fn is_encodable(response: &HttpResponse) -> bool {
    if response.body.is_empty() || response.status == 204 || response.status == 304 {
        return false;
    }

    match response.header("Content-Encoding") {
        Some(encoding) => {
            let encoding = encoding.trim();
            encoding.is_empty() || encoding.eq_ignore_ascii_case(IDENTITY)
        }
        None => true,
    }
}

fn append_vary(response: &mut HttpResponse) {
    let key = response
        .headers
        .keys()
        .find(|k| k.eq_ignore_ascii_case("Vary"))
        .cloned()
        .unwrap_or_else(|| "Vary".to_string());

    let vary = response.headers.entry(key).or_default();
    let present = vary
        .split(',')
        .any(|v| v.trim().eq_ignore_ascii_case("Accept-Encoding"));
    if !present {
        if !vary.is_empty() {
            vary.push_str(", ");
        }
        vary.push_str("Accept-Encoding");
    }
}

fn payload_too_large(max_bytes: usize) -> Error {
    Error::PayloadTooLarge(format!(
        "Payload content length greater than maximum allowed: {}",
        max_bytes
    ))
}

/// GET and HEAD requests carry no payload to parse.
fn has_payload(method: &str) -> bool {
    !(method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD"))
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

/// Reject JSON requests whose body does not parse.
fn validate_payload(request: &HttpRequest) -> Result<(), Error> {
    let Some(content_type) = request.header("Content-Type") else {
        return Ok(());
    };
    if request.body.is_empty() || !is_json(content_type) {
        return Ok(());
    }

    serde_json::from_slice::<serde::de::IgnoredAny>(&request.body)
        .map(|_| ())
        .map_err(|e| {
            debug!(error = %e, "Rejecting malformed JSON payload");
            Error::BadRequest("Invalid request payload JSON format".to_string())
        })
}
