use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use regex::Regex;

fn image_data_uri() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:(image/[A-Za-z0-9.+-]+);base64,([A-Za-z0-9+/=\r\n]+)$").ok())
        .as_ref()
}

/// A decoded inline `data:image/...;base64,...` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Bytes,
}

impl DataUri {
    /// Cheap prefix test, used before attempting a full parse.
    pub fn looks_like_image(value: &str) -> bool {
        value.starts_with("data:image/")
    }

    /// Parse an inline image. Anything that is not a well-formed base64
    /// image data URI yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        if !Self::looks_like_image(value) {
            return None;
        }
        let caps = image_data_uri()?.captures(value)?;
        let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD.decode(payload).ok()?;
        Some(Self {
            mime: caps[1].to_ascii_lowercase(),
            bytes: Bytes::from(bytes),
        })
    }

    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "image/avif" => "avif",
            _ => "bin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_uri() {
        let uri = DataUri::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(uri.mime, "image/png");
        assert_eq!(uri.bytes.as_ref(), b"hello");
        assert_eq!(uri.extension(), "png");
    }

    #[test]
    fn ignores_urls_and_non_images() {
        assert!(DataUri::parse("https://cdn.example.com/a.png").is_none());
        assert!(DataUri::parse("data:text/plain;base64,aGVsbG8=").is_none());
        assert!(DataUri::parse("data:image/png;base64,***").is_none());
    }

    #[test]
    fn svg_gets_svg_extension() {
        let uri = DataUri::parse("data:image/svg+xml;base64,PHN2Zy8+").unwrap();
        assert_eq!(uri.extension(), "svg");
    }
}
