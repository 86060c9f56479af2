//! Plugin options and their validation.
//!
//! Options arrive either as an untyped JSON value (the form a server
//! configuration file or a `register` call carries) or through the typed
//! builder. Both paths end in [`BrokOptions::validate`].
//!
//! ```
//! use brok::{BrokOptions, CompressionMode};
//! use serde_json::json;
//!
//! let options = BrokOptions::from_value(json!({ "compress": { "quality": 3 } })).unwrap();
//! let compress = options.compress.unwrap();
//! assert_eq!(compress.mode, CompressionMode::Generic);
//! assert_eq!(compress.quality, 3);
//! assert!(!options.decompress);
//!
//! assert!(BrokOptions::from_value(json!({ "compress": true })).is_err());
//! ```

use crate::error::BrokError;
use crate::mode::CompressionMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Default Brotli quality
pub const DEFAULT_QUALITY: u32 = 5;

/// Highest Brotli quality
pub const MAX_QUALITY: u32 = 11;

/// Normalized encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeParams {
    pub mode: CompressionMode,
    pub quality: u32,
}

impl Default for EncodeParams {
    fn default() -> Self {
        Self {
            mode: CompressionMode::Generic,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl EncodeParams {
    pub fn new(mode: CompressionMode, quality: u32) -> Self {
        Self { mode, quality }
    }

    /// Apply per-call overrides. Each field set in `overrides` replaces the
    /// corresponding field here; unset fields keep their value.
    pub fn merge(&self, overrides: &EncodeOverrides) -> EncodeParams {
        EncodeParams {
            mode: overrides.mode.unwrap_or(self.mode),
            quality: overrides.quality.unwrap_or(self.quality),
        }
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), BrokError> {
        if self.quality > MAX_QUALITY {
            return Err(BrokError::invalid(
                format!("{}.quality", field),
                quality_reason(),
            ));
        }
        Ok(())
    }

    /// Parse a `compress` object, starting from the defaults.
    fn from_object(map: Map<String, Value>, field: &str) -> Result<Self, BrokError> {
        let overrides = EncodeOverrides::from_object(map, field)?;
        Ok(EncodeParams::default().merge(&overrides))
    }
}

/// Per-call encoder overrides, such as a route's `br` compression settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOverrides {
    pub mode: Option<CompressionMode>,
    pub quality: Option<u32>,
}

impl EncodeOverrides {
    /// Parse overrides from an optional JSON value.
    ///
    /// `None`, `null` and `{}` mean "no overrides". Field errors are named
    /// relative to the override object (`mode`, `quality`).
    pub fn from_value(value: Option<&Value>) -> Result<Self, BrokError> {
        match value {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) => Self::from_object(map.clone(), ""),
            Some(other) => Err(BrokError::invalid(
                "overrides",
                format!("must be an object, got {}", kind(other)),
            )),
        }
    }

    fn from_object(map: Map<String, Value>, field: &str) -> Result<Self, BrokError> {
        let path = |key: &str| {
            if field.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", field, key)
            }
        };

        let mut overrides = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "mode" => overrides.mode = parse_mode(&value, &path("mode"))?,
                "quality" => overrides.quality = parse_quality(&value, &path("quality"))?,
                _ => return Err(BrokError::invalid(path(key.as_str()), "is not allowed")),
            }
        }
        Ok(overrides)
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.quality.is_none()
    }
}

/// Options accepted by the brok plugin.
///
/// `compress: None` disables response compression (`"compress": false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct BrokOptions {
    pub compress: Option<EncodeParams>,
    pub decompress: bool,
}

impl Default for BrokOptions {
    fn default() -> Self {
        Self {
            compress: Some(EncodeParams::default()),
            decompress: false,
        }
    }
}

impl BrokOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> BrokOptionsBuilder {
        BrokOptionsBuilder::new()
    }

    /// Merge a partial options value over the defaults and validate it.
    ///
    /// Keys set to `null` keep their default.
    pub fn from_value(value: Value) -> Result<Self, BrokError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(BrokError::invalid(
                    "options",
                    format!("must be an object, got {}", kind(&other)),
                ));
            }
        };

        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "compress" => {
                    options.compress = match value {
                        Value::Null => options.compress,
                        Value::Bool(false) => None,
                        Value::Object(map) => Some(EncodeParams::from_object(map, "compress")?),
                        other => {
                            return Err(BrokError::invalid(
                                "compress",
                                format!("must be false or an object, got {}", kind(&other)),
                            ));
                        }
                    }
                }
                "decompress" => {
                    options.decompress = match value {
                        Value::Null => options.decompress,
                        Value::Bool(enabled) => enabled,
                        other => {
                            return Err(BrokError::invalid(
                                "decompress",
                                format!("must be a boolean, got {}", kind(&other)),
                            ));
                        }
                    }
                }
                _ => return Err(BrokError::invalid(key.as_str(), "is not allowed")),
            }
        }

        options.validate()?;
        Ok(options)
    }

    /// Check invariants that typed construction cannot rule out.
    pub fn validate(&self) -> Result<(), BrokError> {
        match &self.compress {
            Some(params) => params.validate("compress"),
            None => Ok(()),
        }
    }

    /// The options in their untyped form
    pub fn to_value(&self) -> Value {
        let compress = match &self.compress {
            Some(params) => json!({
                "mode": params.mode.name(),
                "quality": params.quality,
            }),
            None => Value::Bool(false),
        };
        json!({
            "compress": compress,
            "decompress": self.decompress,
        })
    }
}

impl TryFrom<Value> for BrokOptions {
    type Error = BrokError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        BrokOptions::from_value(value)
    }
}

impl From<BrokOptions> for Value {
    fn from(options: BrokOptions) -> Self {
        options.to_value()
    }
}

/// Builder for [`BrokOptions`]
#[derive(Debug, Clone, Default)]
pub struct BrokOptionsBuilder {
    options: BrokOptions,
}

impl BrokOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression mode, re-enabling compression if it was disabled
    pub fn mode(mut self, mode: CompressionMode) -> Self {
        self.options.compress.get_or_insert_with(EncodeParams::default).mode = mode;
        self
    }

    /// Set the compression quality, re-enabling compression if it was disabled
    pub fn quality(mut self, quality: u32) -> Self {
        self.options.compress.get_or_insert_with(EncodeParams::default).quality = quality;
        self
    }

    pub fn disable_compression(mut self) -> Self {
        self.options.compress = None;
        self
    }

    pub fn decompress(mut self, enabled: bool) -> Self {
        self.options.decompress = enabled;
        self
    }

    /// Validate and return the options
    pub fn build(self) -> Result<BrokOptions, BrokError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

fn parse_mode(value: &Value, field: &str) -> Result<Option<CompressionMode>, BrokError> {
    match value {
        Value::Null => Ok(None),
        Value::String(name) => name
            .parse::<CompressionMode>()
            .map(Some)
            .map_err(|reason| BrokError::invalid(field, reason)),
        other => Err(BrokError::invalid(
            field,
            format!("must be a string, got {}", kind(other)),
        )),
    }
}

fn parse_quality(value: &Value, field: &str) -> Result<Option<u32>, BrokError> {
    if value.is_null() {
        return Ok(None);
    }

    integer(value)
        .filter(|q| (0..=MAX_QUALITY as i64).contains(q))
        .map(|q| Some(q as u32))
        .ok_or_else(|| BrokError::invalid(field, quality_reason()))
}

/// Integral value of a JSON number; `3.0` counts, `3.4` does not.
fn integer(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(n) = number.as_i64() {
        return Some(n);
    }
    number
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
        .map(|f| f as i64)
}

fn quality_reason() -> String {
    format!("must be an integer between 0 and {}", MAX_QUALITY)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(value: Value) -> String {
        BrokOptions::from_value(value)
            .unwrap_err()
            .field()
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_defaults() {
        let options = BrokOptions::from_value(Value::Null).unwrap();
        assert_eq!(options, BrokOptions::default());
        assert_eq!(
            options.compress,
            Some(EncodeParams::new(CompressionMode::Generic, 5))
        );
        assert!(!options.decompress);

        assert_eq!(BrokOptions::from_value(json!({})).unwrap(), BrokOptions::default());
    }

    #[test]
    fn test_partial_merge() {
        let options = BrokOptions::from_value(json!({ "compress": { "mode": "text" } })).unwrap();
        assert_eq!(
            options.compress,
            Some(EncodeParams::new(CompressionMode::Text, DEFAULT_QUALITY))
        );

        let options = BrokOptions::from_value(json!({ "decompress": true })).unwrap();
        assert!(options.decompress);
        assert!(options.compress.is_some());
    }

    #[test]
    fn test_compress_disabled() {
        let options = BrokOptions::from_value(json!({ "compress": false })).unwrap();
        assert!(options.compress.is_none());
    }

    #[test]
    fn test_null_keeps_default() {
        let options =
            BrokOptions::from_value(json!({ "compress": null, "decompress": null })).unwrap();
        assert_eq!(options, BrokOptions::default());
    }

    #[test]
    fn test_rejections_name_the_field() {
        assert_eq!(field_of(json!({ "compress": true })), "compress");
        assert_eq!(field_of(json!({ "compress": { "mode": 0 } })), "compress.mode");
        assert_eq!(field_of(json!({ "compress": { "mode": "test" } })), "compress.mode");
        assert_eq!(field_of(json!({ "compress": { "quality": 3.4 } })), "compress.quality");
        assert_eq!(field_of(json!({ "compress": { "quality": 12 } })), "compress.quality");
        assert_eq!(field_of(json!({ "compress": { "quality": -1 } })), "compress.quality");
        assert_eq!(field_of(json!({ "compress": { "quality": "5" } })), "compress.quality");
        assert_eq!(field_of(json!({ "compress": { "unknown": true } })), "compress.unknown");
        assert_eq!(field_of(json!({ "decompress": "yes" })), "decompress");
        assert_eq!(field_of(json!({ "native": true })), "native");
        assert_eq!(field_of(json!([1, 2])), "options");
    }

    #[test]
    fn test_quality_bounds_and_integral_floats() {
        for quality in [0, 11] {
            let options =
                BrokOptions::from_value(json!({ "compress": { "quality": quality } })).unwrap();
            assert_eq!(options.compress.unwrap().quality, quality);
        }

        let options = BrokOptions::from_value(json!({ "compress": { "quality": 4.0 } })).unwrap();
        assert_eq!(options.compress.unwrap().quality, 4);
    }

    #[test]
    fn test_builder() {
        let options = BrokOptions::builder()
            .mode(CompressionMode::Text)
            .quality(9)
            .decompress(true)
            .build()
            .unwrap();
        assert_eq!(
            options.compress,
            Some(EncodeParams::new(CompressionMode::Text, 9))
        );
        assert!(options.decompress);

        let options = BrokOptions::builder().disable_compression().build().unwrap();
        assert!(options.compress.is_none());

        let err = BrokOptions::builder().quality(12).build().unwrap_err();
        assert_eq!(err.field(), Some("compress.quality"));
    }

    #[test]
    fn test_overrides_merge_field_by_field() {
        let base = EncodeParams::new(CompressionMode::Generic, 5);

        let overrides = EncodeOverrides::from_value(Some(&json!({ "quality": 1 }))).unwrap();
        assert_eq!(base.merge(&overrides), EncodeParams::new(CompressionMode::Generic, 1));

        let overrides = EncodeOverrides::from_value(Some(&json!({ "mode": "text" }))).unwrap();
        assert_eq!(base.merge(&overrides), EncodeParams::new(CompressionMode::Text, 5));

        let overrides = EncodeOverrides::from_value(Some(&json!({}))).unwrap();
        assert!(overrides.is_empty());
        assert_eq!(base.merge(&overrides), base);
    }

    #[test]
    fn test_invalid_overrides() {
        let err = EncodeOverrides::from_value(Some(&json!({ "quality": 20 }))).unwrap_err();
        assert_eq!(err.field(), Some("quality"));

        let err = EncodeOverrides::from_value(Some(&json!({ "level": 2 }))).unwrap_err();
        assert_eq!(err.field(), Some("level"));

        let err = EncodeOverrides::from_value(Some(&json!("text"))).unwrap_err();
        assert_eq!(err.field(), Some("overrides"));
    }

    #[test]
    fn test_value_roundtrip() {
        let options = BrokOptions::builder()
            .mode(CompressionMode::Text)
            .decompress(true)
            .build()
            .unwrap();
        let value = options.to_value();
        assert_eq!(value["compress"]["mode"], "text");
        assert_eq!(value["compress"]["quality"], 5);
        assert_eq!(BrokOptions::from_value(value).unwrap(), options);

        let disabled = BrokOptions::builder().disable_compression().build().unwrap();
        assert_eq!(disabled.to_value()["compress"], false);
    }

    #[test]
    fn test_serde_uses_validation() {
        let options: BrokOptions =
            serde_json::from_str(r#"{ "compress": { "quality": 2 } }"#).unwrap();
        assert_eq!(options.compress.unwrap().quality, 2);

        assert!(serde_json::from_str::<BrokOptions>(r#"{ "compress": true }"#).is_err());
    }
}
