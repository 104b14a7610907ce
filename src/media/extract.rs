use base64::{
    engine::general_purpose::STANDARD,
    Engine as _,
};
use regex::Regex;
use sha1::{
    Digest,
    Sha1,
};

use crate::{
    anki::AnkiClient,
    media::{
        html::ensure_img_tag,
        payload::{
            data_url_regex,
            sanitize_image_payload,
        },
    },
};

/// One per-note event raised inside the media pipeline. Warnings end up in
/// the caller's warnings/logs list; info entries record successful saves.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaLog {
    pub index: usize,
    pub kind: MediaLogKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaLogKind {
    Info,
    Warning,
}

impl MediaLog {
    pub fn info(index: usize, message: impl Into<String>) -> Self {
        MediaLog { index, kind: MediaLogKind::Info, message: message.into() }
    }

    pub fn warning(index: usize, message: impl Into<String>) -> Self {
        MediaLog { index, kind: MediaLogKind::Warning, message: message.into() }
    }

    pub fn is_warning(&self) -> bool {
        self.kind == MediaLogKind::Warning
    }
}

/// Matches a data URL embedded mid-text. The payload stops at the first
/// character that cannot be base64, so surrounding prose survives.
fn inline_data_url_regex() -> Regex {
    Regex::new(r"(?i)data:image/([a-z0-9+.\-]+);base64,([a-zA-Z0-9+/=]+)").unwrap()
}

fn sha1_hex(bytes: &[u8]) -> String {
    let digest = Sha1::digest(bytes);
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Scans every string field for embedded data URLs, stores each one as a
/// content-addressed media file (img_<sha1>.<ext>) and rewrites the field:
/// matched substrings are stripped and one idempotent img tag per saved
/// file is appended. A failed match leaves its substring in place and
/// records a warning; the other matches are unaffected.
pub async fn extract_data_urls(
    client: &AnkiClient,
    fields: &mut serde_json::Map<String, serde_json::Value>,
    sink: &mut Vec<MediaLog>,
    note_index: usize,
) {
    let inline_re = inline_data_url_regex();
    let whole_re = data_url_regex();

    let keys: Vec<String> = fields.keys().cloned().collect();
    for key in keys {
        let original = match fields.get(&key).and_then(serde_json::Value::as_str) {
            Some(text) => text.to_string(),
            None => continue,
        };

        // A field that is one data URL end to end goes through as a single
        // whole-value match, so hard-wrapped payloads survive; only other
        // text is scanned for inline runs.
        let trimmed = original.trim();
        let (text, spans): (String, Vec<(usize, usize, String)>) = if whole_re.is_match(trimmed)
        {
            (trimmed.to_string(), vec![(0, trimmed.len(), trimmed.to_string())])
        } else {
            let spans = inline_re
                .captures_iter(&original)
                .map(|caps| {
                    let whole = caps.get(0).unwrap();
                    (whole.start(), whole.end(), whole.as_str().to_string())
                })
                .collect();
            (original.clone(), spans)
        };
        if spans.is_empty() {
            continue;
        }

        let mut saved_files: Vec<String> = Vec::new();
        let mut rebuilt = String::new();
        let mut cursor = 0;

        for (start, end, data_url) in spans {
            match store_data_url(client, &data_url).await {
                Ok(filename) => {
                    sink.push(MediaLog::info(
                        note_index,
                        format!("data_url_saved:{}->{}", key, filename),
                    ));
                    saved_files.push(filename);
                    rebuilt.push_str(&text[cursor..start]);
                    cursor = end;
                }
                Err(error) => {
                    sink.push(MediaLog::warning(
                        note_index,
                        format!("data_url_failed:{}: {}", key, error),
                    ));
                    rebuilt.push_str(&text[cursor..end]);
                    cursor = end;
                }
            }
        }
        rebuilt.push_str(&text[cursor..]);

        let mut clean_text = rebuilt.trim().to_string();
        for filename in &saved_files {
            clean_text = ensure_img_tag(&clean_text, filename);
        }
        fields.insert(key, serde_json::Value::String(clean_text));
    }
}

async fn store_data_url(client: &AnkiClient, data_url: &str) -> Result<String, String> {
    let (clean_b64, ext_hint) =
        sanitize_image_payload(data_url).map_err(|error| error.to_string())?;
    let raw = STANDARD.decode(clean_b64.as_bytes()).map_err(|error| error.to_string())?;
    let filename = format!("img_{}.{}", sha1_hex(&raw), ext_hint.unwrap_or("png"));
    client
        .store_media_file(&filename, &clean_b64)
        .await
        .map_err(|error| error.to_string())?;
    Ok(filename)
}
