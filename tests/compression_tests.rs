//! Response compression through the host pipeline.

use brok::{Brok, BrokOptions, BrotliEncoderFactory, CompressionMode, EncodeParams};
use brok_core::{
    CodingError, ContentEncoder, EncodedStream, EncoderFactory, HttpRequest, HttpResponse, Route,
    RouteConfig, Server, ServerConfig,
};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn brotli_decompress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    brotli::BrotliDecompress(&mut &data[..], &mut out).expect("valid brotli stream");
    out
}

fn provision(options: Option<Value>) -> Server {
    let mut server = Server::with_config(ServerConfig::new().min_bytes(1));
    server
        .register(&Brok::default(), options.unwrap_or(Value::Null))
        .unwrap();
    server
}

fn compressable() -> Route {
    Route::get("/compressable", |_req: HttpRequest| async {
        Ok(HttpResponse::text("compressable"))
    })
}

fn hello_world(path: &str) -> Route {
    Route::get(path, |_req: HttpRequest| async {
        HttpResponse::json(&json!({ "hello": "world" }))
    })
}

fn accepts_br(path: &str) -> HttpRequest {
    HttpRequest::get(path).with_header("accept-encoding", "br")
}

/// Records the parameters of every encoder it builds.
#[derive(Clone, Default)]
struct Spy {
    inner: BrotliEncoderFactory,
    seen: Arc<Mutex<Vec<EncodeParams>>>,
}

impl Spy {
    fn with_options(options: BrokOptions) -> Self {
        Self {
            inner: Brok::new(options).unwrap().encoder_factory().unwrap(),
            seen: Arc::default(),
        }
    }

    fn last(&self) -> Option<EncodeParams> {
        self.seen.lock().unwrap().last().copied()
    }
}

impl EncoderFactory for Spy {
    fn create(&self, options: Option<&Value>) -> Result<Box<dyn ContentEncoder>, CodingError> {
        let encoder = self
            .inner
            .encoder(options)
            .map_err(|e| CodingError::InvalidOptions {
                encoding: "br",
                reason: e.to_string(),
            })?;
        self.seen.lock().unwrap().push(encoder.params());
        Ok(Box::new(encoder))
    }
}

#[tokio::test]
async fn test_applied_to_compressable_responses() {
    let mut server = provision(None);
    server.route(compressable());

    let response = server.inject(accepts_br("/compressable")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-encoding").unwrap(), "br");
    assert!(response.header("content-length").is_none());

    let decompressed = brotli_decompress(&response.body);
    assert_eq!(decompressed.len(), 12);
    assert_eq!(decompressed, b"compressable");
}

#[tokio::test]
async fn test_late_registration() {
    let mut server = Server::with_config(ServerConfig::new().min_bytes(1));
    server.route(
        compressable().with_config(RouteConfig::new().compression("br", json!({}))),
    );
    server.register(&Brok::default(), Value::Null).unwrap();

    let response = server.inject(accepts_br("/compressable")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-encoding").unwrap(), "br");
    assert!(response.header("content-length").is_none());
    assert_eq!(brotli_decompress(&response.body), b"compressable");
}

#[tokio::test]
async fn test_requires_accept_encoding() {
    let mut server = provision(None);
    server.route(compressable());

    let response = server.inject(HttpRequest::get("/compressable")).await;

    assert_eq!(response.status, 200);
    assert!(response.header("content-encoding").is_none());
    assert_eq!(response.body.len(), 12);
    assert_eq!(response.body_text(), "compressable");
}

#[tokio::test]
async fn test_can_be_disabled() {
    let mut server = provision(Some(json!({ "compress": false })));
    server.route(compressable());

    let response = server.inject(accepts_br("/compressable")).await;

    assert_eq!(response.status, 200);
    assert!(response.header("content-encoding").is_none());
    assert_eq!(response.body_text(), "compressable");
    assert!(!server.registry().has_encoder("br"));
}

#[tokio::test]
async fn test_supports_mode_option() {
    let options = BrokOptions::from_value(json!({ "compress": { "mode": "text" } })).unwrap();
    let spy = Spy::with_options(options);

    let mut server = Server::with_config(ServerConfig::new().min_bytes(1));
    server.encoder("br", spy.clone()).unwrap();
    server.route(hello_world("/compressable"));

    let response = server.inject(accepts_br("/compressable")).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-encoding").unwrap(), "br");
    assert!(response.header("content-length").is_none());

    let body: Value = serde_json::from_slice(&brotli_decompress(&response.body)).unwrap();
    assert_eq!(body, json!({ "hello": "world" }));

    let params = spy.last().unwrap();
    assert_eq!(params.mode, CompressionMode::Text);
    assert_eq!(params.mode.code(), 1);
}

#[tokio::test]
async fn test_route_compression_options() {
    let spy = Spy::with_options(BrokOptions::default());

    let mut server = Server::with_config(ServerConfig::new().min_bytes(1));
    server.encoder("br", spy.clone()).unwrap();
    server.route(
        hello_world("/text").with_config(RouteConfig::new().compression("br", json!({ "mode": "text" }))),
    );
    server.route(
        hello_world("/quality").with_config(RouteConfig::new().compression("br", json!({ "quality": 1 }))),
    );

    let res1 = server.inject(accepts_br("/text")).await;
    assert_eq!(res1.status, 200);
    assert_eq!(res1.header("content-encoding").unwrap(), "br");
    assert!(res1.header("content-length").is_none());
    let body: Value = serde_json::from_slice(&brotli_decompress(&res1.body)).unwrap();
    assert_eq!(body, json!({ "hello": "world" }));
    assert_eq!(spy.last(), Some(EncodeParams::new(CompressionMode::Text, 5)));

    let res2 = server.inject(accepts_br("/quality")).await;
    assert_eq!(res2.status, 200);
    assert_eq!(res2.header("content-encoding").unwrap(), "br");
    let body: Value = serde_json::from_slice(&brotli_decompress(&res2.body)).unwrap();
    assert_eq!(body, json!({ "hello": "world" }));
    assert_eq!(spy.last(), Some(EncodeParams::new(CompressionMode::Generic, 1)));
}

#[tokio::test]
async fn test_invalid_route_options_send_identity() {
    let mut server = provision(None);
    server.route(
        compressable().with_config(RouteConfig::new().compression("br", json!({ "quality": 99 }))),
    );

    let response = server.inject(accepts_br("/compressable")).await;

    assert_eq!(response.status, 200);
    assert!(response.header("content-encoding").is_none());
    assert_eq!(response.body_text(), "compressable");
}

#[test]
fn test_rejects_unknown_options() {
    for compress in [
        json!(true),
        json!({ "mode": 0 }),
        json!({ "mode": "test" }),
        json!({ "quality": 3.4 }),
        json!({ "unknown": true }),
    ] {
        let mut server = Server::new();
        let result = server.register(&Brok::default(), json!({ "compress": compress }));
        assert!(result.is_err(), "accepted compress = {}", compress);
        assert!(!server.registry().has_encoder("br"));
    }
}

#[test]
fn test_rejects_invalid_decompress() {
    for decompress in [json!({}), json!(10), json!("yes")] {
        let mut server = Server::new();
        let result = server.register(&Brok::default(), json!({ "decompress": decompress }));
        assert!(result.is_err(), "accepted decompress = {}", decompress);
        assert!(!server.registry().has_decoder("br"));
        assert!(server.plugins().is_empty());
    }
}

#[tokio::test]
async fn test_roundtrip_across_modes_and_qualities() {
    let original = "The quick brown fox jumps over the lazy dog. ".repeat(120);

    for mode in ["generic", "text"] {
        for quality in 0..=11 {
            let mut server = provision(Some(json!({
                "compress": { "mode": mode, "quality": quality }
            })));
            let text = original.clone();
            server.route(Route::get("/", move |_req: HttpRequest| {
                let text = text.clone();
                async move { Ok(HttpResponse::text(text)) }
            }));

            let response = server.inject(accepts_br("/")).await;
            assert_eq!(response.header("content-encoding").unwrap(), "br");
            assert!(
                response.body.len() < original.len(),
                "{} q{} did not shrink the body",
                mode,
                quality
            );
            assert_eq!(brotli_decompress(&response.body), original.as_bytes());
        }
    }
}

#[tokio::test]
async fn test_preferred_encoding_wins_over_identity() {
    let mut server = provision(None);
    server.route(compressable());

    let response = server
        .inject(HttpRequest::get("/compressable").with_header("Accept-Encoding", "identity;q=0.5, br"))
        .await;
    assert_eq!(response.header("content-encoding").unwrap(), "br");

    let response = server
        .inject(HttpRequest::get("/compressable").with_header("Accept-Encoding", "gzip, deflate"))
        .await;
    assert!(response.header("content-encoding").is_none());
}

#[tokio::test]
async fn test_identity_ranked_above_br() {
    let mut server = provision(None);
    server.route(compressable());

    let response = server
        .inject(
            HttpRequest::get("/compressable")
                .with_header("Accept-Encoding", "identity;q=1, br;q=0.5"),
        )
        .await;

    assert_eq!(response.status, 200);
    assert!(response.header("content-encoding").is_none());
    assert_eq!(response.body_text(), "compressable");
    assert_eq!(response.header("vary").unwrap(), "Accept-Encoding");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_are_independent() {
    let mut server = provision(Some(json!({ "compress": { "quality": 9 } })));
    server.route(Route::get("/item/:id", |req: HttpRequest| async move {
        let id = req.param("id").cloned().unwrap_or_default();
        Ok(HttpResponse::text(format!("item {} ", id).repeat(300)))
    }));
    let server = Arc::new(server);

    let handles: Vec<_> = (0..24)
        .map(|id| {
            let server = server.clone();
            tokio::spawn(async move {
                let response = server.inject(accepts_br(&format!("/item/{}", id))).await;
                (id, response)
            })
        })
        .collect();

    for handle in handles {
        let (id, response) = handle.await.unwrap();
        assert_eq!(
            brotli_decompress(&response.body),
            format!("item {} ", id).repeat(300).into_bytes()
        );
    }
}

#[tokio::test]
async fn test_streaming_encoder() {
    let factory = Brok::default().encoder_factory().unwrap();
    let chunks: Vec<Result<Bytes, CodingError>> = (0..50)
        .map(|i| Ok(Bytes::from(format!("line {}\n", i))))
        .collect();

    let encoded: Vec<Bytes> = EncodedStream::new(stream::iter(chunks), factory.create(None).unwrap())
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    let expected: String = (0..50).map(|i| format!("line {}\n", i)).collect();
    assert_eq!(brotli_decompress(&encoded.concat()), expected.as_bytes());
}
