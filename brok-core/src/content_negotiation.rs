//! Content negotiation for the `Accept-Encoding` header.
//!
//! Encodings are plain lowercase tokens (`br`, `gzip`, ...) rather than a
//! closed enum, since the set the server can produce is whatever plugins
//! registered.
//!
//! # Examples
//!
//! ```
//! use brok_core::content_negotiation::{AcceptEncoding, negotiate_encoding};
//!
//! let accept = AcceptEncoding::parse("gzip;q=0.5, br");
//! assert_eq!(negotiate_encoding(&accept, &["br"]), Some("br"));
//! assert_eq!(negotiate_encoding(&accept, &["zstd"]), None);
//! ```

use std::cmp::Ordering;

/// The token meaning "no transformation".
pub const IDENTITY: &str = "identity";

/// Represents a parsed `Accept-Encoding` header.
#[derive(Debug, Clone, Default)]
pub struct AcceptEncoding {
    /// Encodings with their quality values, sorted by preference.
    pub encodings: Vec<(String, f32)>,
}

impl AcceptEncoding {
    /// Parse an Accept-Encoding header string.
    ///
    /// # Example
    ///
    /// ```
    /// use brok_core::content_negotiation::AcceptEncoding;
    ///
    /// let accept = AcceptEncoding::parse("gzip, deflate, br;q=0.9");
    /// assert_eq!(accept.encodings.len(), 3);
    /// ```
    pub fn parse(header: &str) -> Self {
        let mut encodings: Vec<(String, f32)> = header
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }

                let (enc_part, quality) = Self::extract_quality(part);
                let token = enc_part.trim().to_ascii_lowercase();
                if token.is_empty() {
                    return None;
                }
                Some((token, quality))
            })
            .collect();

        // Stable sort keeps header order among equal qualities
        encodings.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Self { encodings }
    }

    fn extract_quality(s: &str) -> (&str, f32) {
        let mut params = s.split(';');
        let enc_part = params.next().unwrap_or("");

        let quality = params
            .filter_map(|p| {
                let (key, value) = p.split_once('=')?;
                if key.trim().eq_ignore_ascii_case("q") {
                    value.trim().parse::<f32>().ok()
                } else {
                    None
                }
            })
            .next()
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);

        (enc_part, quality)
    }

    /// Explicit quality for a token, falling back to `*`.
    fn explicit_quality(&self, encoding: &str) -> Option<f32> {
        self.encodings
            .iter()
            .find(|(enc, _)| enc.eq_ignore_ascii_case(encoding))
            .or_else(|| self.encodings.iter().find(|(enc, _)| enc == "*"))
            .map(|(_, q)| *q)
    }

    /// Get the quality value for a specific encoding.
    ///
    /// `identity` is acceptable unless explicitly refused.
    pub fn quality_for(&self, encoding: &str) -> f32 {
        match self.explicit_quality(encoding) {
            Some(q) => q,
            None if encoding.eq_ignore_ascii_case(IDENTITY) => 1.0,
            None => 0.0,
        }
    }

    /// Get the preferred encoding.
    pub fn preferred(&self) -> Option<&str> {
        self.encodings.first().map(|(enc, _)| enc.as_str())
    }

    /// Check if an encoding is acceptable.
    pub fn accepts(&self, encoding: &str) -> bool {
        self.quality_for(encoding) > 0.0
    }
}

/// Negotiate the best encoding from available options.
///
/// Ties are broken by the order of `available`. An explicitly listed
/// `identity` competes too and wins only with a strictly higher quality,
/// in which case [`IDENTITY`] is returned. Returns `None` when nothing in
/// `available` is acceptable; callers fall back to identity.
pub fn negotiate_encoding<'a>(accept: &AcceptEncoding, available: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&'a str, f32)> = None;

    for &enc in available {
        let quality = accept.quality_for(enc);
        if quality > 0.0 {
            match &best {
                None => best = Some((enc, quality)),
                Some((_, best_q)) if quality > *best_q => {
                    best = Some((enc, quality));
                }
                _ => {}
            }
        }
    }

    let (enc, quality) = best?;
    let identity = accept
        .encodings
        .iter()
        .find(|(token, _)| token == IDENTITY)
        .map(|(_, q)| *q);

    match identity {
        Some(identity_q) if identity_q > quality => Some(IDENTITY),
        _ => Some(enc),
    }
}
