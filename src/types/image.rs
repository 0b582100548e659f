//! Decoding of assembled image payloads.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use super::message::Message;
use crate::errors::{StreamError, StreamResult};

/// Image container format, sniffed from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG.
    Png,
    /// JPEG.
    Jpeg,
    /// GIF.
    Gif,
    /// WebP.
    Webp,
    /// Anything else.
    Unknown,
}

impl ImageFormat {
    /// Detects the format from magic bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            ImageFormat::Png
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            ImageFormat::Jpeg
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            ImageFormat::Gif
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            ImageFormat::Webp
        } else {
            ImageFormat::Unknown
        }
    }

    /// MIME type, if known.
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Png => Some("image/png"),
            ImageFormat::Jpeg => Some("image/jpeg"),
            ImageFormat::Gif => Some("image/gif"),
            ImageFormat::Webp => Some("image/webp"),
            ImageFormat::Unknown => None,
        }
    }
}

/// Decoded image from an image generation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Detected format.
    pub format: ImageFormat,
}

impl GeneratedImage {
    /// Decodes the content of an assistant message.
    pub fn from_message(message: &Message) -> StreamResult<Self> {
        Self::from_base64(&message.content)
    }

    /// Decodes a base64 payload.
    ///
    /// Whitespace and a `data:<mime>;base64,` prefix are tolerated. Both the
    /// standard and URL-safe alphabets are accepted, padded or not.
    pub fn from_base64(payload: &str) -> StreamResult<Self> {
        let payload = strip_data_url(payload);
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();

        if compact.is_empty() {
            return Err(StreamError::ImageDecode {
                message: "empty image payload".to_string(),
            });
        }

        let bytes = [STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD]
            .iter()
            .find_map(|engine| engine.decode(&compact).ok())
            .ok_or_else(|| StreamError::ImageDecode {
                message: format!("payload of {} chars is not valid base64", compact.len()),
            })?;

        Ok(Self {
            format: ImageFormat::detect(&bytes),
            bytes,
        })
    }
}

fn strip_data_url(payload: &str) -> &str {
    let trimmed = payload.trim_start();
    if trimmed.starts_with("data:") {
        if let Some(idx) = trimmed.find(";base64,") {
            return &trimmed[idx + ";base64,".len()..];
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_decode_standard_padded() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(b"rest");
        let encoded = STANDARD.encode(&bytes);

        let image = GeneratedImage::from_base64(&encoded).unwrap();
        assert_eq!(image.bytes, bytes);
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.format.mime_type(), Some("image/png"));
    }

    #[test]
    fn test_decode_url_safe_unpadded() {
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0xFB, 0xFF];
        let encoded = URL_SAFE_NO_PAD.encode(&bytes);

        let image = GeneratedImage::from_base64(&encoded).unwrap();
        assert_eq!(image.bytes, bytes);
        assert_eq!(image.format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_decode_tolerates_whitespace_and_data_url() {
        let encoded = STANDARD.encode(b"GIF89a-body");
        let (head, tail) = encoded.split_at(6);
        let payload = format!("data:image/gif;base64,{}\n{}  ", head, tail);

        let image = GeneratedImage::from_base64(&payload).unwrap();
        assert_eq!(image.bytes, b"GIF89a-body");
        assert_eq!(image.format, ImageFormat::Gif);
    }

    #[test]
    fn test_from_message() {
        let message = Message::assistant(STANDARD.encode(b"plain"));
        let image = GeneratedImage::from_message(&message).unwrap();
        assert_eq!(image.format, ImageFormat::Unknown);
        assert_eq!(image.format.mime_type(), None);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            GeneratedImage::from_base64("  "),
            Err(StreamError::ImageDecode { .. })
        ));
        assert!(matches!(
            GeneratedImage::from_base64("not*base64!"),
            Err(StreamError::ImageDecode { .. })
        ));
    }

    #[test]
    fn test_detect_webp() {
        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBPVP8 ");
        assert_eq!(ImageFormat::detect(&bytes), ImageFormat::Webp);
    }
}
