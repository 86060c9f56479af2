//! Compression modes and their Brotli encoder constants

use brotli::enc::backward_references::BrotliEncoderMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Brotli compression mode, as named in the options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// No assumptions about the input
    #[default]
    Generic,
    /// UTF-8 text input
    Text,
}

/// Option name to mode, with the Brotli `BROTLI_PARAM_MODE` value.
const MODES: [(&str, CompressionMode, u32); 2] = [
    ("generic", CompressionMode::Generic, 0),
    ("text", CompressionMode::Text, 1),
];

impl CompressionMode {
    /// Look up a mode by its option name (case-sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        MODES
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, mode, _)| *mode)
    }

    /// All accepted option names, in table order
    pub fn names() -> impl Iterator<Item = &'static str> {
        MODES.iter().map(|(n, _, _)| *n)
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionMode::Generic => MODES[0].0,
            CompressionMode::Text => MODES[1].0,
        }
    }

    /// Numeric codec constant (`BROTLI_MODE_GENERIC` = 0, `BROTLI_MODE_TEXT` = 1)
    pub fn code(self) -> u32 {
        match self {
            CompressionMode::Generic => MODES[0].2,
            CompressionMode::Text => MODES[1].2,
        }
    }

    /// The encoder mode handed to `brotli`
    pub fn native(self) -> BrotliEncoderMode {
        match self {
            CompressionMode::Generic => BrotliEncoderMode::BROTLI_MODE_GENERIC,
            CompressionMode::Text => BrotliEncoderMode::BROTLI_MODE_TEXT,
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "must be one of [{}]",
                Self::names().collect::<Vec<_>>().join(", ")
            )
        })
    }
}
