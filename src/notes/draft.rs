use serde_json::{
    Map,
    Value,
};

use crate::{
    core::AnkipipeError,
    notes::tags::normalize_tags,
};

/// Top-level keys with a fixed meaning in a note payload. Anything else in
/// a flat-shaped note is treated as a field.
pub const NOTE_RESERVED_TOP_LEVEL_KEYS: [&str; 7] =
    ["tags", "images", "dedup_key", "deck", "model", "deckName", "modelName"];

pub const DEFAULT_TARGET_FIELD: &str = "Back";
pub const DEFAULT_MAX_SIDE: u32 = 768;

/// One note to create, as validated at the boundary. Field keys are still
/// the caller's raw spellings; canonicalization happens against the model
/// schema during submission.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub fields: Map<String, Value>,
    pub tags: Vec<String>,
    pub images: Vec<ImageRequest>,
    pub dedup_key: Option<String>,
    pub deck: Option<String>,
    pub model: Option<String>,
}

/// An explicit image attachment: exactly one of image_base64/image_url is
/// expected (the embedder warns when neither is set).
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub target_field: String,
    pub filename: Option<String>,
    pub max_side: u32,
}

impl Default for ImageRequest {
    fn default() -> Self {
        ImageRequest {
            image_base64: None,
            image_url: None,
            target_field: DEFAULT_TARGET_FIELD.to_string(),
            filename: None,
            max_side: DEFAULT_MAX_SIDE,
        }
    }
}

/// A partial update for one existing note.
#[derive(Debug, Clone)]
pub struct NoteUpdate {
    pub note_id: u64,
    pub fields: Option<Map<String, Value>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    pub deck: Option<String>,
    pub images: Vec<ImageRequest>,
}

impl NoteDraft {
    /// The single validating constructor for raw JSON notes. Accepts the
    /// nested shape ({"fields": {...}, "tags": ...}) and the flat shape,
    /// where every non-reserved top-level key becomes a field.
    pub fn from_value(value: &Value) -> Result<Self, AnkipipeError> {
        let object = value
            .as_object()
            .ok_or_else(|| AnkipipeError::Validation("note must be an object".to_string()))?;

        let mut fields = Map::new();
        match object.get("fields") {
            Some(raw_fields) => {
                let raw = raw_fields.as_object().ok_or_else(|| {
                    AnkipipeError::Validation("fields must be an object".to_string())
                })?;
                for (key, field_value) in raw {
                    fields.insert(key.clone(), coerce_field_text(key, field_value)?);
                }
            }
            None => {
                for (key, field_value) in object {
                    if NOTE_RESERVED_TOP_LEVEL_KEYS.contains(&key.as_str()) {
                        continue;
                    }
                    fields.insert(key.clone(), coerce_field_text(key, field_value)?);
                }
                if fields.is_empty() {
                    return Err(AnkipipeError::Validation(
                        "note must contain a fields object with the note's fields".to_string(),
                    ));
                }
            }
        }

        Ok(NoteDraft {
            fields,
            tags: object.get("tags").map(normalize_tags).unwrap_or_default(),
            images: parse_image_list(object.get("images"))?,
            dedup_key: optional_plain_string(object.get("dedup_key"), "dedup_key")?,
            deck: aliased_name(object, "deck", "deckName")?,
            model: aliased_name(object, "model", "modelName")?,
        })
    }
}

impl ImageRequest {
    pub fn from_value(value: &Value) -> Result<Self, AnkipipeError> {
        let object = value
            .as_object()
            .ok_or_else(|| AnkipipeError::Validation("image spec must be an object".to_string()))?;

        let image_url = match object.get("image_url").or_else(|| object.get("url")) {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(validate_http_url(text)?),
            Some(other) => {
                return Err(AnkipipeError::Validation(format!(
                    "image url must be a string, got {}",
                    other
                )));
            }
        };

        let target_field = match object.get("target_field") {
            None | Some(Value::Null) => DEFAULT_TARGET_FIELD.to_string(),
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(AnkipipeError::Validation(
                        "target_field must be a non-empty string".to_string(),
                    ));
                }
                trimmed.to_string()
            }
            Some(other) => {
                return Err(AnkipipeError::Validation(format!(
                    "target_field must be a string, got {}",
                    other
                )));
            }
        };

        let max_side = match object.get("max_side") {
            None | Some(Value::Null) => DEFAULT_MAX_SIDE,
            Some(Value::Number(number)) => match number.as_u64() {
                Some(value) if value >= 1 => value as u32,
                _ => {
                    return Err(AnkipipeError::Validation(
                        "max_side must be an integer >= 1".to_string(),
                    ));
                }
            },
            Some(other) => {
                return Err(AnkipipeError::Validation(format!(
                    "max_side must be an integer, got {}",
                    other
                )));
            }
        };

        Ok(ImageRequest {
            image_base64: optional_plain_string(object.get("image_base64"), "image_base64")?,
            image_url,
            target_field,
            filename: optional_plain_string(object.get("filename"), "filename")?,
            max_side,
        })
    }
}

impl NoteUpdate {
    pub fn from_value(value: &Value) -> Result<Self, AnkipipeError> {
        let object = value
            .as_object()
            .ok_or_else(|| AnkipipeError::Validation("note update must be an object".to_string()))?;

        let note_id = match object.get("noteId").or_else(|| object.get("note_id")) {
            Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
                AnkipipeError::Validation(format!("noteId must be an integer, got {}", number))
            })?,
            Some(Value::String(text)) => text.trim().parse::<u64>().map_err(|_| {
                AnkipipeError::Validation(format!("noteId must be an integer, got {:?}", text))
            })?,
            _ => {
                return Err(AnkipipeError::Validation("noteId is required".to_string()));
            }
        };

        let fields = match object.get("fields") {
            None | Some(Value::Null) => None,
            Some(Value::Object(raw)) => Some(raw.clone()),
            Some(other) => {
                return Err(AnkipipeError::Validation(format!(
                    "fields must be an object, got {}",
                    other
                )));
            }
        };

        Ok(NoteUpdate {
            note_id,
            fields,
            add_tags: object
                .get("addTags")
                .or_else(|| object.get("add_tags"))
                .map(normalize_tags)
                .unwrap_or_default(),
            remove_tags: object
                .get("removeTags")
                .or_else(|| object.get("remove_tags"))
                .map(normalize_tags)
                .unwrap_or_default(),
            deck: aliased_name(object, "deck", "deckName")?,
            images: parse_image_list(object.get("images").or_else(|| object.get("attachments")))?,
        })
    }
}

fn coerce_field_text(key: &str, value: &Value) -> Result<Value, AnkipipeError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(number) => Ok(Value::String(number.to_string())),
        Value::Bool(flag) => Ok(Value::String(flag.to_string())),
        other => Err(AnkipipeError::Validation(format!(
            "field '{}' must be a string value, got {}",
            key, other
        ))),
    }
}

fn parse_image_list(raw: Option<&Value>) -> Result<Vec<ImageRequest>, AnkipipeError> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(ImageRequest::from_value).collect(),
        Some(other) => {
            Err(AnkipipeError::Validation(format!("images must be a list, got {}", other)))
        }
    }
}

fn optional_plain_string(raw: Option<&Value>, key: &str) -> Result<Option<String>, AnkipipeError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => {
            Err(AnkipipeError::Validation(format!("{} must be a string, got {}", key, other)))
        }
    }
}

fn aliased_name(
    object: &Map<String, Value>,
    key: &str,
    alias: &str,
) -> Result<Option<String>, AnkipipeError> {
    match object.get(key).or_else(|| object.get(alias)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(AnkipipeError::Validation(format!(
                    "{} must be a non-empty string",
                    key
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
        Some(other) => {
            Err(AnkipipeError::Validation(format!("{} must be a string, got {}", key, other)))
        }
    }
}

fn validate_http_url(raw: &str) -> Result<String, AnkipipeError> {
    let trimmed = raw.trim();
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|error| AnkipipeError::Validation(format!("invalid image url: {}", error)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AnkipipeError::Validation(format!(
            "image url must use http or https, got {}",
            parsed.scheme()
        )));
    }
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flat_shape_turns_non_reserved_keys_into_fields() {
        let draft = NoteDraft::from_value(&json!({
            "Front": "Q",
            "back": "A",
            "tags": "a, b",
            "deckName": "Inbox",
            "dedup_key": "k1"
        }))
        .unwrap();

        assert_eq!(draft.fields.len(), 2);
        assert_eq!(draft.fields["Front"], json!("Q"));
        assert_eq!(draft.tags, vec!["a", "b"]);
        assert_eq!(draft.deck.as_deref(), Some("Inbox"));
        assert_eq!(draft.dedup_key.as_deref(), Some("k1"));
    }

    #[test]
    fn nested_shape_keeps_fields_as_given() {
        let draft = NoteDraft::from_value(&json!({
            "fields": {"Front": "Q", "Count": 3},
            "model": "Basic"
        }))
        .unwrap();

        assert_eq!(draft.fields["Count"], json!("3"));
        assert_eq!(draft.model.as_deref(), Some("Basic"));
        assert!(draft.tags.is_empty());
    }

    #[test]
    fn note_without_any_fields_is_rejected() {
        let err = NoteDraft::from_value(&json!({"tags": ["x"]})).unwrap_err();
        match err {
            AnkipipeError::Validation(message) => assert!(message.contains("fields object")),
            other => panic!("expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn nested_field_values_must_be_scalars() {
        let err =
            NoteDraft::from_value(&json!({"fields": {"Front": {"deep": true}}})).unwrap_err();
        assert!(err.to_string().contains("'Front'"));
    }

    #[test]
    fn image_spec_defaults_and_validation() {
        let image = ImageRequest::from_value(&json!({"image_base64": "aGk="})).unwrap();
        assert_eq!(image.target_field, "Back");
        assert_eq!(image.max_side, 768);
        assert!(image.image_url.is_none());

        let err = ImageRequest::from_value(&json!({"max_side": 0})).unwrap_err();
        assert!(err.to_string().contains("max_side"));

        let err = ImageRequest::from_value(&json!({"url": "ftp://x/y.png"})).unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn image_url_accepts_the_url_alias() {
        let image =
            ImageRequest::from_value(&json!({"url": "https://example.com/a.png"})).unwrap();
        assert_eq!(image.image_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn note_update_coerces_ids_and_honors_aliases() {
        let update = NoteUpdate::from_value(&json!({
            "noteId": "1501",
            "addTags": "x  y",
            "attachments": [{"image_base64": "aGk=", "target_field": "Front"}],
            "deck": "Archive"
        }))
        .unwrap();

        assert_eq!(update.note_id, 1501);
        assert_eq!(update.add_tags, vec!["x", "y"]);
        assert_eq!(update.images.len(), 1);
        assert_eq!(update.images[0].target_field, "Front");
        assert_eq!(update.deck.as_deref(), Some("Archive"));
        assert!(update.fields.is_none());
    }

    #[test]
    fn note_update_requires_an_id() {
        let err = NoteUpdate::from_value(&json!({"fields": {"Front": "Q"}})).unwrap_err();
        match err {
            AnkipipeError::Validation(message) => assert_eq!(message, "noteId is required"),
            other => panic!("expected Validation error, got {:?}", other),
        }
    }
}
