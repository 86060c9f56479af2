// Options file loading

use crate::{BrokError, BrokOptions};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Supported options file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Loads [`BrokOptions`] from JSON or TOML.
///
/// Both formats are read into an untyped value and validated the same way
/// as options passed to `register`.
///
/// ```
/// use brok::config::{FileFormat, OptionsLoader};
///
/// let options = OptionsLoader::new(FileFormat::Toml)
///     .parse("decompress = true\n[compress]\nmode = \"text\"\n")
///     .unwrap();
/// assert!(options.decompress);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OptionsLoader {
    format: FileFormat,
}

impl OptionsLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: impl AsRef<Path>) -> Result<Self, BrokError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BrokError::Load("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| BrokError::Load(format!("Unsupported format: {}", ext)))?;

        Ok(Self::new(format))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Load and validate options from a file
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<BrokOptions, BrokError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| BrokError::Load(format!("Failed to read {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), format = ?self.format, "Loading brok options");
        self.parse(&content)
    }

    /// Parse and validate options from a string
    pub fn parse(&self, content: &str) -> Result<BrokOptions, BrokError> {
        let value = match self.format {
            FileFormat::Json => serde_json::from_str::<Value>(content)
                .map_err(|e| BrokError::Parse(format!("JSON parse error: {}", e)))?,
            FileFormat::Toml => toml::from_str::<Value>(content)
                .map_err(|e| BrokError::Parse(format!("TOML parse error: {}", e)))?,
        };

        BrokOptions::from_value(value)
    }
}

/// Load options from a `.json` or `.toml` file
pub fn load(path: impl AsRef<Path>) -> Result<BrokOptions, BrokError> {
    let path = path.as_ref();
    OptionsLoader::auto(path)?.load_file(path)
}
