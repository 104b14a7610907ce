use base64::{
    engine::general_purpose::STANDARD,
    Engine as _,
};
use regex::Regex;

use crate::core::AnkipipeError;

/// Matches a value that is one data URL end to end. The payload group spans
/// newlines so hard-wrapped base64 still matches; the sanitizer strips the
/// whitespace back out before decoding.
pub(crate) fn data_url_regex() -> Regex {
    Regex::new(r"(?is)^data:image/([a-z0-9+.\-]+);base64,(.+)$").unwrap()
}

pub fn ext_from_mime(mime_subtype: &str) -> &'static str {
    match mime_subtype.to_lowercase().as_str() {
        "jpeg" | "jpg" | "pjpeg" => "jpg",
        "png" | "x-png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        _ => "png",
    }
}

/// Accepts bare base64 or a data URL, strict-decodes it and hands back the
/// re-encoded clean payload plus the extension implied by the mime subtype
/// (None for bare payloads). ASCII whitespace inside the payload is
/// dropped before decoding; anything else invalid is an error.
pub fn sanitize_image_payload(
    payload: &str,
) -> Result<(String, Option<&'static str>), AnkipipeError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(AnkipipeError::EmptyImagePayload);
    }

    if let Some(captures) = data_url_regex().captures(trimmed) {
        let subtype = captures[1].to_string();
        let b64_payload = strip_ascii_whitespace(&captures[2]);
        let raw = STANDARD.decode(b64_payload.as_bytes())?;
        return Ok((STANDARD.encode(raw), Some(ext_from_mime(&subtype))));
    }

    let bare = strip_ascii_whitespace(trimmed);
    let raw = STANDARD.decode(bare.as_bytes())?;
    Ok((STANDARD.encode(raw), None))
}

fn strip_ascii_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}
