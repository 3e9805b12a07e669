use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::util::detect_mime_type;

/// An embedded resource (`<binary>`), usually an image.
///
/// `data` holds the base64 text exactly as it appears in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Binary {
    pub id: String,
    pub content_type: String,
    pub data: String,
}

impl Binary {
    pub fn new(
        id: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Build a binary from raw bytes, detecting the content type from the
    /// id's extension or the payload's magic bytes.
    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Self {
        let id = id.into();
        let content_type = detect_mime_type(&id, bytes).unwrap_or("application/octet-stream");
        Self {
            content_type: content_type.to_string(),
            data: STANDARD.encode(bytes),
            id,
        }
    }

    /// Decode the base64 payload. Line breaks and other whitespace are ignored.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let compact: Vec<u8> = self
            .data
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    }
}
