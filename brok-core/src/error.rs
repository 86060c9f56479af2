// Error types for the brok host

use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Registration error: {0}")]
    Registration(String),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::Deserialization(_) => 400,
            Error::BadRequest(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message shown to clients. Server errors never leak their detail.
    pub fn public_message(&self) -> String {
        match self {
            Error::RouteNotFound(_) => "Not Found".to_string(),
            Error::Deserialization(msg) | Error::BadRequest(msg) => msg.clone(),
            Error::PayloadTooLarge(msg) => msg.clone(),
            _ => "An internal server error occurred".to_string(),
        }
    }

    /// JSON error payload in the `{ statusCode, error, message }` shape.
    pub fn to_json(&self) -> serde_json::Value {
        let status = self.status_code();
        json!({
            "statusCode": status,
            "error": reason_phrase(status),
            "message": self.public_message(),
        })
    }
}

/// Canonical reason phrase for the status codes the host emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Errors raised by content encoders and decoders
#[derive(Error, Debug)]
pub enum CodingError {
    /// The input is not a valid stream for this coding
    #[error("Corrupt {encoding} stream: {reason}")]
    Corrupt {
        encoding: &'static str,
        reason: String,
    },

    /// Per-call options handed to a factory were rejected
    #[error("Invalid {encoding} options: {reason}")]
    InvalidOptions {
        encoding: &'static str,
        reason: String,
    },

    /// Decoded output grew past the allowed size
    #[error("Decoded {encoding} payload exceeds {limit} bytes")]
    TooLarge {
        encoding: &'static str,
        limit: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
