use tracing::debug;
use uuid::Uuid;

use crate::{
    anki::{
        AnkiClient,
        ModelSchema,
        NoteInfo,
    },
    core::AnkipipeError,
    media::{
        extract::MediaLog,
        fetch::fetch_image_as_base64,
        html::ensure_img_tag,
        payload::sanitize_image_payload,
    },
    notes::draft::ImageRequest,
};

/// What to do with an image whose target field is not in the schema.
/// Strict entrypoints fail the whole batch naming the allowed fields;
/// lenient ones record a warning and move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFieldPolicy {
    Strict,
    Lenient,
}

/// Resolves each explicit image request to bytes (inline payload or remote
/// download), stores it and appends an idempotent img tag to the target
/// field. Returns the canonical names of the fields that received a tag.
/// When the pending fields map lacks the target, the note's existing value
/// (if provided) seeds the append.
#[allow(clippy::too_many_arguments)]
pub async fn apply_image_requests(
    client: &AnkiClient,
    images: &[ImageRequest],
    fields: &mut serde_json::Map<String, serde_json::Value>,
    schema: &ModelSchema,
    existing: Option<&NoteInfo>,
    policy: TargetFieldPolicy,
    sink: &mut Vec<MediaLog>,
    note_index: usize,
) -> Result<Vec<String>, AnkipipeError> {
    let mut touched_fields: Vec<String> = Vec::new();

    for image in images {
        let mut ext_hint: Option<&'static str> = None;
        let data_b64 = if let Some(inline) = &image.image_base64 {
            match sanitize_image_payload(inline) {
                Ok((clean, hint)) => {
                    ext_hint = hint;
                    clean
                }
                Err(error) => {
                    sink.push(MediaLog::warning(
                        note_index,
                        format!("invalid_image_base64: {}", error),
                    ));
                    continue;
                }
            }
        } else if let Some(url) = &image.image_url {
            match fetch_image_as_base64(url, image.max_side).await {
                Ok(encoded) => encoded,
                Err(error) => {
                    sink.push(MediaLog::warning(
                        note_index,
                        format!("fetch_image_failed: {}", error),
                    ));
                    continue;
                }
            }
        } else {
            sink.push(MediaLog::warning(note_index, "no_image_provided"));
            continue;
        };

        let canonical = match schema.resolve_alias(&image.target_field) {
            Some(canonical) => canonical.to_string(),
            None => match policy {
                TargetFieldPolicy::Strict => {
                    let allowed = schema
                        .fields
                        .iter()
                        .map(|name| format!("'{}'", name))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(AnkipipeError::Validation(format!(
                        "Unknown image target field '{}' for note index {}. Allowed fields: [{}]",
                        image.target_field, note_index, allowed
                    )));
                }
                TargetFieldPolicy::Lenient => {
                    sink.push(MediaLog::warning(
                        note_index,
                        format!("unknown_target_field:{}", image.target_field),
                    ));
                    continue;
                }
            },
        };

        let filename = image
            .filename
            .clone()
            .unwrap_or_else(|| format!("{}.{}", Uuid::new_v4().simple(), ext_hint.unwrap_or("jpg")));

        match client.store_media_file(&filename, &data_b64).await {
            Ok(_) => {
                let previous = fields
                    .get(&canonical)
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .or_else(|| {
                        existing
                            .and_then(|info| info.field_value(&canonical))
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                fields.insert(
                    canonical.clone(),
                    serde_json::Value::String(ensure_img_tag(&previous, &filename)),
                );
                debug!("attached {} to field {}", filename, canonical);
                touched_fields.push(canonical);
            }
            Err(error) => {
                sink.push(MediaLog::warning(
                    note_index,
                    format!("store_media_failed: {}", error),
                ));
            }
        }
    }

    Ok(touched_fields)
}
