//! Input validation: media-type allow-list and target-colour parsing.
//!
//! Validation runs before anything touches the provider or the disk, so a bad
//! upload costs nothing but a 400. Both checks are pure functions over the
//! request fields.

use crate::error::TutorError;
use std::fmt;
use std::path::Path;

/// Media types accepted by the solve path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Heic,
    Heif,
    Pdf,
}

impl MediaType {
    pub const ALLOWED: [MediaType; 6] = [
        MediaType::Png,
        MediaType::Jpeg,
        MediaType::Webp,
        MediaType::Heic,
        MediaType::Heif,
        MediaType::Pdf,
    ];

    /// Canonical MIME string sent to the provider.
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
            MediaType::Heic => "image/heic",
            MediaType::Heif => "image/heif",
            MediaType::Pdf => "application/pdf",
        }
    }

    /// Parse a declared `Content-Type`, ignoring case and `;` parameters.
    ///
    /// Anything outside the allow-list is [`TutorError::UnsupportedMediaType`].
    pub fn parse(declared: &str) -> Result<Self, TutorError> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        Self::ALLOWED
            .into_iter()
            .find(|m| m.as_mime() == essence)
            .ok_or_else(|| TutorError::UnsupportedMediaType {
                media_type: declared.to_string(),
            })
    }

    /// Guess the MIME string from a file extension.
    ///
    /// Unknown extensions yield `application/octet-stream`, which [`parse`]
    /// then rejects.
    ///
    /// [`parse`]: MediaType::parse
    pub fn guess_mime(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            Some("heif") => "image/heif",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// A target colour normalised to LaTeX's 0–1 `rgb` model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Parse `#RRGGBB` (the leading `#` is optional, hex digits are
    /// case-insensitive).
    pub fn from_hex(input: &str) -> Result<Self, TutorError> {
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TutorError::invalid_request("Invalid target color hex format."));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| TutorError::invalid_request("Invalid target color hex format."))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Channels as fractions of 255.
    pub fn normalised(&self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }

    /// The `{r, g, b}` argument for `\textcolor[rgb]`, three decimals each.
    pub fn latex_triple(&self) -> String {
        let (r, g, b) = self.normalised();
        format!("{{{r:.3}, {g:.3}, {b:.3}}}")
    }
}

/// Reject missing or whitespace-only LaTeX text.
pub fn require_source<'a>(source: Option<&'a str>, what: &str) -> Result<&'a str, TutorError> {
    match source {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(TutorError::invalid_request(format!("{what} is required."))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_every_listed_type() {
        for m in MediaType::ALLOWED {
            assert_eq!(MediaType::parse(m.as_mime()).unwrap(), m);
        }
    }

    #[test]
    fn parse_ignores_case_and_parameters() {
        assert_eq!(MediaType::parse("IMAGE/PNG").unwrap(), MediaType::Png);
        assert_eq!(
            MediaType::parse("application/pdf; charset=binary").unwrap(),
            MediaType::Pdf
        );
    }

    #[test]
    fn parse_rejects_unlisted_types() {
        for bad in ["image/gif", "text/plain", "application/octet-stream", ""] {
            assert!(
                matches!(
                    MediaType::parse(bad),
                    Err(TutorError::UnsupportedMediaType { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn guess_mime_from_extension() {
        assert_eq!(MediaType::guess_mime(Path::new("hw.JPG")), "image/jpeg");
        assert_eq!(MediaType::guess_mime(Path::new("sheet.pdf")), "application/pdf");
        assert_eq!(
            MediaType::guess_mime(Path::new("notes.txt")),
            "application/octet-stream"
        );
    }

    #[test]
    fn hex_colour_normalises_to_three_decimals() {
        assert_eq!(
            RgbColor::from_hex("#FF0000").unwrap().latex_triple(),
            "{1.000, 0.000, 0.000}"
        );
        assert_eq!(
            RgbColor::from_hex("#0080ff").unwrap().latex_triple(),
            "{0.000, 0.502, 1.000}"
        );
        assert_eq!(
            RgbColor::from_hex("336699").unwrap().latex_triple(),
            "{0.200, 0.400, 0.600}"
        );
    }

    #[test]
    fn every_channel_value_rounds_as_r_over_255() {
        for v in 0..=255u8 {
            let c = RgbColor { r: v, g: 0, b: 0 };
            let expected = format!("{:.3}", f64::from(v) / 255.0);
            assert!(c.latex_triple().starts_with(&format!("{{{expected},")));
        }
    }

    #[test]
    fn invalid_hex_is_rejected() {
        for bad in ["red", "#ZZZZZZ", "#FFF", "#FF00000", "", "#", "#12345G"] {
            assert!(
                matches!(
                    RgbColor::from_hex(bad),
                    Err(TutorError::InvalidRequest { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn require_source_rejects_blank() {
        assert!(require_source(None, "LaTeX input string").is_err());
        assert!(require_source(Some("  \n\t"), "LaTeX input string").is_err());
        assert_eq!(require_source(Some("x"), "LaTeX").unwrap(), "x");
    }
}
