#![cfg(feature = "config")]
//! Options loaded from disk.

use brok::{Brok, BrokError, CompressionMode, config};
use brok_core::Server;
use std::fs;
use std::path::PathBuf;

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("brok-{}-{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_toml_and_register() {
    let path = write_temp(
        "options.toml",
        r#"
        decompress = true

        [compress]
        mode = "text"
        quality = 9
        "#,
    );

    let options = config::load(&path).unwrap();
    fs::remove_file(&path).ok();

    let compress = options.compress.unwrap();
    assert_eq!(compress.mode, CompressionMode::Text);
    assert_eq!(compress.quality, 9);

    let mut server = Server::new();
    server.register(&Brok::new(options).unwrap(), serde_json::Value::Null).unwrap();
    assert!(server.registry().has_encoder("br"));
    assert!(server.registry().has_decoder("br"));
}

#[test]
fn test_load_json() {
    let path = write_temp("options.json", r#"{ "compress": false }"#);

    let options = config::load(&path).unwrap();
    fs::remove_file(&path).ok();

    assert!(options.compress.is_none());
    assert!(!options.decompress);
}

#[test]
fn test_invalid_file_is_rejected() {
    let path = write_temp("invalid.json", r#"{ "compress": { "mode": "fast" } }"#);

    let err = config::load(&path).unwrap_err();
    fs::remove_file(&path).ok();

    assert!(matches!(err, BrokError::InvalidOption { .. }));
    assert_eq!(err.field(), Some("compress.mode"));
}
