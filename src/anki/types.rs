use serde::{
    ser::SerializeMap,
    Deserialize,
    Serialize,
    Serializer,
};
use serde_json::Value;

use crate::core::AnkipipeError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeckInfo {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSummary {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model: String,
    pub fields: Vec<String>,
    pub templates: Value,
    pub styling: String,
}

/// One note as reported by notesInfo, after defensive normalization.
/// Field order is kept as the response delivered it; for well-formed
/// responses that is the model's field order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: u64,
    pub model_name: Option<String>,
    pub deck_name: Option<String>,
    pub tags: Vec<String>,
    #[serde(serialize_with = "serialize_fields")]
    pub fields: Vec<(String, String)>,
    pub cards: Vec<u64>,
}

impl NoteInfo {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, value)| value.as_str())
    }
}

fn serialize_fields<S>(fields: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (name, value) in fields {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

/// notesInfo responses vary across AnkiConnect builds: missing notes come
/// back as null or as an empty object, field values arrive bare or wrapped
/// in {value, order}, ids are sometimes strings. This flattens all of that.
pub fn normalize_notes_info(raw: &Value) -> Result<Vec<Option<NoteInfo>>, AnkipipeError> {
    let entries = raw.as_array().ok_or_else(|| {
        AnkipipeError::Protocol("notesInfo response must be a list".to_string())
    })?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| normalize_note_entry(entry, index))
        .collect()
}

fn normalize_note_entry(raw: &Value, index: usize) -> Result<Option<NoteInfo>, AnkipipeError> {
    if raw.is_null() {
        return Ok(None);
    }

    let object = match raw.as_object() {
        Some(object) => object,
        None => {
            return Err(AnkipipeError::Protocol(format!(
                "notesInfo[{}] must be an object or null",
                index
            )));
        }
    };

    // Some builds report a missing note as an empty object.
    if object.is_empty() {
        return Ok(None);
    }

    let note_id = match object.get("noteId") {
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
            AnkipipeError::Protocol(format!(
                "notesInfo[{}].noteId must be an integer, got {}",
                index, number
            ))
        })?,
        Some(Value::String(text)) => {
            let stripped = text.trim();
            if stripped.is_empty() {
                return Err(AnkipipeError::Protocol(format!(
                    "notesInfo[{}].noteId is empty",
                    index
                )));
            }
            stripped.parse::<u64>().map_err(|_| {
                AnkipipeError::Protocol(format!(
                    "notesInfo[{}].noteId must be an integer, got {:?}",
                    index, text
                ))
            })?
        }
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "notesInfo[{}].noteId must be an integer, got {}",
                index,
                other.unwrap_or(&Value::Null)
            )));
        }
    };

    Ok(Some(NoteInfo {
        note_id,
        model_name: object.get("modelName").and_then(Value::as_str).map(str::to_string),
        deck_name: object.get("deckName").and_then(Value::as_str).map(str::to_string),
        tags: normalize_info_tags(object.get("tags")),
        fields: normalize_info_fields(object.get("fields")),
        cards: normalize_info_cards(object.get("cards")),
    }))
}

fn normalize_info_fields(raw: Option<&Value>) -> Vec<(String, String)> {
    let object = match raw.and_then(Value::as_object) {
        Some(object) => object,
        None => return Vec::new(),
    };

    object
        .iter()
        .map(|(key, value)| {
            let candidate = match value {
                Value::Object(inner) if inner.contains_key("value") => {
                    inner.get("value").unwrap_or(&Value::Null)
                }
                other => other,
            };
            let text = match candidate {
                Value::Null => String::new(),
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

fn normalize_info_tags(raw: Option<&Value>) -> Vec<String> {
    let entries = match raw.and_then(Value::as_array) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    let mut tags = Vec::new();
    for tag in entries {
        match tag {
            Value::Null => {}
            Value::String(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    tags.push(trimmed.to_string());
                }
            }
            other => tags.push(other.to_string()),
        }
    }
    tags
}

fn normalize_info_cards(raw: Option<&Value>) -> Vec<u64> {
    let entries = match raw.and_then(Value::as_array) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    let mut cards = Vec::new();
    for card in entries {
        match card {
            Value::Number(number) => {
                if let Some(id) = number.as_u64() {
                    cards.push(id);
                } else if let Some(id) = number.as_f64() {
                    cards.push(id as u64);
                }
            }
            Value::String(text) => {
                if let Ok(id) = text.trim().parse::<u64>() {
                    cards.push(id);
                }
            }
            _ => {}
        }
    }
    cards
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unwraps_value_objects_and_keeps_field_order() {
        let raw = json!([{
            "noteId": 42,
            "modelName": "Basic",
            "deckName": "Default",
            "tags": ["alpha", "  ", null],
            "fields": {
                "Front": {"value": "Q", "order": 0},
                "Back": {"value": "A", "order": 1}
            },
            "cards": [7, "8", null, "x"]
        }]);

        let notes = normalize_notes_info(&raw).unwrap();
        let note = notes[0].as_ref().unwrap();

        assert_eq!(note.note_id, 42);
        assert_eq!(note.model_name.as_deref(), Some("Basic"));
        assert_eq!(note.tags, vec!["alpha"]);
        assert_eq!(
            note.fields,
            vec![("Front".to_string(), "Q".to_string()), ("Back".to_string(), "A".to_string())]
        );
        assert_eq!(note.cards, vec![7, 8]);
        assert_eq!(note.field_value("Back"), Some("A"));
    }

    #[test]
    fn null_and_empty_entries_mean_missing() {
        let raw = json!([null, {}, {"noteId": "9", "fields": {"Front": "bare"}}]);

        let notes = normalize_notes_info(&raw).unwrap();

        assert!(notes[0].is_none());
        assert!(notes[1].is_none());
        let note = notes[2].as_ref().unwrap();
        assert_eq!(note.note_id, 9);
        assert_eq!(note.fields, vec![("Front".to_string(), "bare".to_string())]);
    }

    #[test]
    fn rejects_non_list_response_and_bad_ids() {
        match normalize_notes_info(&json!({"notes": []})) {
            Err(AnkipipeError::Protocol(message)) => {
                assert_eq!(message, "notesInfo response must be a list")
            }
            other => panic!("expected Protocol error, got {:?}", other),
        }

        match normalize_notes_info(&json!([{"noteId": "abc"}])) {
            Err(AnkipipeError::Protocol(message)) => {
                assert!(message.contains("noteId must be an integer"))
            }
            other => panic!("expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn note_info_serializes_fields_as_object() {
        let note = NoteInfo {
            note_id: 1,
            model_name: Some("Basic".to_string()),
            deck_name: None,
            tags: vec![],
            fields: vec![("Front".to_string(), "Q".to_string())],
            cards: vec![],
        };

        let rendered = serde_json::to_value(&note).unwrap();
        assert_eq!(rendered["fields"], json!({"Front": "Q"}));
        assert_eq!(rendered["noteId"], json!(1));
    }
}
