use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use super::error::StudioError;

/// Base64 image payload tagged with the MIME type of its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String, // base64 encoded
}

impl InlineImage {
    /// Wrap raw image bytes. Fails if the bytes are not a recognised image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StudioError> {
        let mime_type = sniff_mime(bytes).ok_or_else(|| {
            StudioError::InvalidResponse(format!(
                "payload is not a recognised image ({} bytes)",
                bytes.len()
            ))
        })?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: BASE64.encode(bytes),
        })
    }

    /// Wrap a base64 string, re-deriving the MIME type from the decoded bytes.
    pub fn from_base64(data: &str) -> Result<Self, StudioError> {
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|e| StudioError::InvalidResponse(format!("invalid base64 image: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a `data:<mime>;base64,<data>` URL or bare base64 sent by a client
    pub fn from_data_url(input: &str) -> Result<Self, StudioError> {
        let payload = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    StudioError::InvalidInput("Invalid reference image data URL".to_string())
                })?;
                if !header.ends_with(";base64") {
                    return Err(StudioError::InvalidInput(
                        "Reference image data URL must be base64 encoded".to_string(),
                    ));
                }
                data
            }
            None => input,
        };

        Self::from_base64(payload).map_err(|_| {
            StudioError::InvalidInput("Reference image is not a valid base64 image".to_string())
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>, StudioError> {
        BASE64
            .decode(&self.data)
            .map_err(|e| StudioError::InvalidResponse(format!("invalid base64 image: {}", e)))
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// MIME type from the leading magic bytes
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
    ];

    pub(crate) const JPEG_BYTES: &[u8] =
        &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    pub(crate) fn png_data_url() -> String {
        format!("data:image/png;base64,{}", BASE64.encode(PNG_BYTES))
    }

    #[test]
    fn test_from_bytes_sniffs_png() {
        let image = InlineImage::from_bytes(PNG_BYTES).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_declared_mime_matches_magic_bytes() {
        // A JPEG labelled as PNG by the provider is still reported as JPEG
        let mislabelled = BASE64.encode(JPEG_BYTES);
        let image = InlineImage::from_base64(&mislabelled).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(&image.decode().unwrap()[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_rejects_non_image() {
        let err = InlineImage::from_bytes(b"{\"error\":\"loading\"}").unwrap_err();
        assert!(matches!(err, StudioError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_data_url_and_bare_base64() {
        let from_url = InlineImage::from_data_url(&png_data_url()).unwrap();
        let bare = InlineImage::from_data_url(&BASE64.encode(PNG_BYTES)).unwrap();
        assert_eq!(from_url, bare);
        assert_eq!(from_url.extension(), "png");
    }

    #[test]
    fn test_invalid_data_url_is_client_error() {
        for input in ["data:image/png;base64", "data:image/png,abc", "!!!not base64!!!"] {
            let err = InlineImage::from_data_url(input).unwrap_err();
            assert!(err.is_client_error(), "{}", input);
        }
    }
}
