//! Byte, encoding and XML name helpers shared by the reader and writer.

use std::borrow::Cow;

// ============================================================================
// Encoding Detection
// ============================================================================

/// Decode document bytes to UTF-8 text.
///
/// This function:
/// 1. Uses the hint encoding when it names something other than UTF-8
///    (FB2 files are frequently windows-1251 or KOI8-R)
/// 2. Otherwise decodes as UTF-8, stripping a BOM
///
/// Returns `None` when the bytes are not valid UTF-8 and no usable hint was
/// given. Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Option<Cow<'a, str>> {
    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
        && encoding != encoding_rs::UTF_8
    {
        let (result, _, _) = encoding.decode(bytes);
        return Some(result);
    }

    // Handles the BOM automatically
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);
    if malformed { None } else { Some(result) }
}

/// Like [`decode_text`], but falls back to windows-1251 (the most common
/// legacy encoding for FB2) instead of giving up.
pub fn decode_text_lossy<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    if let Some(text) = decode_text(bytes, hint_encoding) {
        return text;
    }
    let (result, _, _) = encoding_rs::WINDOWS_1251.decode(bytes);
    result
}

/// Extract encoding from XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` to extract the encoding name.
///
/// # Arguments
///
/// * `bytes` - The raw bytes (only the first ~100 bytes are checked)
///
/// # Returns
///
/// The encoding name if found, or `None`.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // Only check the first 100 bytes for the XML declaration
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    // Look for <?xml
    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    // Look for encoding="..." or encoding='...'
    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_start = 1;
    let value_end = after_enc[value_start..].iter().position(|&b| b == quote)? + value_start;

    std::str::from_utf8(&after_enc[value_start..value_end]).ok()
}

// ============================================================================
// XML Names and Entities
// ============================================================================

/// Extract local name from namespaced XML name (e.g., "l:href" -> "href").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
///
/// Character references outside the XML `Char` range resolve to `None`.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(code)
        .filter(|&c| is_xml_char(c))
        .map(|c| c.to_string())
}

/// Whether `c` matches the XML 1.0 `Char` production.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}'
            | '\u{A}'
            | '\u{D}'
            | '\u{20}'..='\u{D7FF}'
            | '\u{E000}'..='\u{FFFD}'
            | '\u{10000}'..='\u{10FFFF}'
    )
}

/// First character of `text` that XML 1.0 does not allow.
pub fn find_invalid_xml_char(text: &str) -> Option<char> {
    text.chars().find(|&c| !is_xml_char(c))
}

/// `text` without the characters XML 1.0 does not allow.
pub fn strip_invalid_xml_chars(text: &str) -> Cow<'_, str> {
    if find_invalid_xml_char(text).is_none() {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|&c| is_xml_char(c)).collect())
}

// ============================================================================
// Media Type Detection
// ============================================================================

/// Detected media format for binary resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    Svg,
    WebP,
    /// Unknown/binary format
    Binary,
}

impl MediaFormat {
    /// Get the MIME type string for this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Svg => "image/svg+xml",
            MediaFormat::WebP => "image/webp",
            MediaFormat::Binary => "application/octet-stream",
        }
    }
}

/// Detect resource format from a binary id and/or raw bytes.
///
/// FB2 binary ids are commonly file names (`cover.jpg`), so the extension is
/// tried first, then the magic bytes.
pub fn detect_media_format(id: &str, data: &[u8]) -> MediaFormat {
    let id_lower = id.to_lowercase();

    if id_lower.ends_with(".jpg") || id_lower.ends_with(".jpeg") {
        return MediaFormat::Jpeg;
    }
    if id_lower.ends_with(".png") {
        return MediaFormat::Png;
    }
    if id_lower.ends_with(".gif") {
        return MediaFormat::Gif;
    }
    if id_lower.ends_with(".svg") {
        return MediaFormat::Svg;
    }
    if id_lower.ends_with(".webp") {
        return MediaFormat::WebP;
    }

    // Fallback to magic byte detection
    if data.len() >= 4 {
        // JPEG: FF D8 FF
        if data[0] == 0xFF && data[1] == 0xD8 {
            return MediaFormat::Jpeg;
        }
        // PNG: 89 50 4E 47 (.PNG)
        if data[0] == 0x89 && data[1] == 0x50 && data[2] == 0x4E && data[3] == 0x47 {
            return MediaFormat::Png;
        }
        // GIF: 47 49 46 (GIF)
        if data[0] == 0x47 && data[1] == 0x49 && data[2] == 0x46 {
            return MediaFormat::Gif;
        }
        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return MediaFormat::WebP;
        }
    }

    MediaFormat::Binary
}

/// Detect MIME type from id extension or magic bytes.
///
/// Returns `None` if the format is unknown.
pub fn detect_mime_type(id: &str, data: &[u8]) -> Option<&'static str> {
    match detect_media_format(id, data) {
        MediaFormat::Binary => None,
        other => Some(other.mime_type()),
    }
}

// ============================================================================
// Tests
// ============================================================================
