//! Error types for the brok plugin

use thiserror::Error;

/// Errors raised while configuring or registering the plugin
#[derive(Error, Debug)]
pub enum BrokError {
    /// An option failed validation
    #[error("Invalid options: {field} {reason}")]
    InvalidOption {
        /// Dotted path of the offending option, e.g. `compress.quality`
        field: String,
        reason: String,
    },

    /// An options file could not be read
    #[error("Failed to load options: {0}")]
    Load(String),

    /// An options file could not be parsed
    #[error("Failed to parse options: {0}")]
    Parse(String),

    /// The host refused a registration
    #[error(transparent)]
    Host(#[from] brok_core::Error),
}

impl BrokError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BrokError::InvalidOption {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending option path, for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            BrokError::InvalidOption { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<BrokError> for brok_core::Error {
    fn from(err: BrokError) -> Self {
        match err {
            BrokError::Host(e) => e,
            other => brok_core::Error::Plugin(other.to_string()),
        }
    }
}
