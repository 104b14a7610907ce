use std::collections::HashMap;

use serde::Serialize;
use serde_json::{
    Map,
    Value,
};
use tracing::debug;

use crate::{
    anki::{
        normalize_notes_info,
        AnkiClient,
        ModelSchema,
        NoteInfo,
        SchemaCache,
    },
    core::AnkipipeError,
    media::{
        apply_image_requests,
        extract_data_urls,
        MediaLog,
        TargetFieldPolicy,
    },
    notes::{
        draft::NoteUpdate,
        fields::{
            canonicalize,
            quote_join,
        },
    },
};

#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub updated: usize,
    pub skipped: usize,
    pub details: Vec<UpdateOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub index: usize,
    pub note_id: u64,
    pub status: UpdateStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updated_fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_changed_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Ok,
    Noop,
    NotFound,
    Error,
}

impl UpdateOutcome {
    fn new(index: usize, note_id: u64, status: UpdateStatus) -> Self {
        UpdateOutcome {
            index,
            note_id,
            status,
            updated_fields: Vec::new(),
            added_tags: Vec::new(),
            removed_tags: Vec::new(),
            deck_changed_to: None,
            error: None,
            logs: Vec::new(),
        }
    }
}

/// Applies per-note partial updates (fields, tags, deck). Notes are fully
/// independent: one note's failure never touches its siblings, and the
/// aggregate counts ok as updated and everything else as skipped.
pub async fn update_notes(
    client: &AnkiClient,
    updates: &[NoteUpdate],
) -> Result<UpdateResult, AnkipipeError> {
    if updates.is_empty() {
        return Err(AnkipipeError::Validation(
            "at least one note update is required".to_string(),
        ));
    }

    let note_ids: Vec<u64> = updates.iter().map(|update| update.note_id).collect();
    let raw_infos = client.notes_info(&note_ids).await?;
    let infos = normalize_notes_info(&raw_infos)?;

    // Correlate by the id each entry carries rather than by position; some
    // deployments omit missing notes instead of sending null.
    let mut info_by_id: HashMap<u64, NoteInfo> = HashMap::new();
    for info in infos.into_iter().flatten() {
        info_by_id.insert(info.note_id, info);
    }

    let mut cache = SchemaCache::new();
    let mut updated = 0;
    let mut skipped = 0;
    let mut details = Vec::with_capacity(updates.len());

    for (index, update) in updates.iter().enumerate() {
        let outcome = match info_by_id.get(&update.note_id) {
            Some(info) => apply_update(client, &mut cache, update, info, index).await,
            None => UpdateOutcome::new(index, update.note_id, UpdateStatus::NotFound),
        };

        if outcome.status == UpdateStatus::Ok {
            updated += 1;
        } else {
            skipped += 1;
        }
        details.push(outcome);
    }

    Ok(UpdateResult { updated, skipped, details })
}

async fn apply_update(
    client: &AnkiClient,
    cache: &mut SchemaCache,
    update: &NoteUpdate,
    info: &NoteInfo,
    index: usize,
) -> UpdateOutcome {
    let mut outcome = UpdateOutcome::new(index, update.note_id, UpdateStatus::Noop);
    let mut sink: Vec<MediaLog> = Vec::new();

    let schema = match effective_schema(client, cache, info).await {
        Ok(schema) => schema,
        Err(error) => {
            outcome.status = UpdateStatus::Error;
            outcome.error = Some(error.to_string());
            return outcome;
        }
    };

    let mut fields_payload: Map<String, Value> = Map::new();
    let mut updated_fields: Vec<String> = Vec::new();

    if let Some(raw_fields) = &update.fields {
        let user_fields = coerce_patch_values(raw_fields);
        let (normalized, matched_count, unknown_keys) =
            canonicalize(&user_fields, &schema.fields);

        if !unknown_keys.is_empty() {
            outcome.status = UpdateStatus::Error;
            outcome.error = Some(format!("unknown_fields: [{}]", quote_join(&unknown_keys)));
            return outcome;
        }

        if matched_count == 0 {
            // Nothing matched; tags and deck changes may still apply below.
            outcome.logs.push("no_matching_fields".to_string());
        } else {
            for raw_key in user_fields.keys() {
                if let Some(canonical) = schema.resolve_alias(raw_key) {
                    let value = normalized.get(canonical).cloned().unwrap_or_default();
                    fields_payload.insert(canonical.to_string(), value);
                    updated_fields.push(canonical.to_string());
                }
            }
        }
    }

    extract_data_urls(client, &mut fields_payload, &mut sink, index).await;

    match apply_image_requests(
        client,
        &update.images,
        &mut fields_payload,
        &schema,
        Some(info),
        TargetFieldPolicy::Lenient,
        &mut sink,
        index,
    )
    .await
    {
        Ok(touched) => updated_fields.extend(touched),
        Err(error) => {
            // Lenient policy never fails on targets; anything else here is a
            // per-note error.
            outcome.status = UpdateStatus::Error;
            outcome.error = Some(error.to_string());
            outcome.logs = sink.into_iter().map(|entry| entry.message).collect();
            return outcome;
        }
    }

    let mut operations_performed = false;
    let mut step_error: Option<String> = None;

    if !fields_payload.is_empty() {
        match client.update_note_fields(update.note_id, &fields_payload).await {
            Ok(()) => operations_performed = true,
            Err(error) => step_error = Some(error.to_string()),
        }
    }

    if step_error.is_none() && !update.add_tags.is_empty() {
        match client.add_tags(&[update.note_id], &update.add_tags.join(" ")).await {
            Ok(()) => {
                outcome.added_tags = update.add_tags.clone();
                operations_performed = true;
            }
            Err(error) => step_error = Some(error.to_string()),
        }
    }

    if step_error.is_none() && !update.remove_tags.is_empty() {
        match client.remove_tags(&[update.note_id], &update.remove_tags.join(" ")).await {
            Ok(()) => {
                outcome.removed_tags = update.remove_tags.clone();
                operations_performed = true;
            }
            Err(error) => step_error = Some(error.to_string()),
        }
    }

    if step_error.is_none() {
        if let Some(deck) = &update.deck {
            let current_deck = info.deck_name.as_deref().unwrap_or_default();
            if deck != current_deck {
                if info.cards.is_empty() {
                    sink.push(MediaLog::warning(index, "no_cards_for_deck_change"));
                } else {
                    match client.change_deck(&info.cards, deck).await {
                        Ok(()) => {
                            outcome.deck_changed_to = Some(deck.clone());
                            operations_performed = true;
                        }
                        Err(error) => step_error = Some(error.to_string()),
                    }
                }
            }
        }
    }

    updated_fields.sort();
    updated_fields.dedup();
    outcome.updated_fields = updated_fields;
    outcome.logs.extend(sink.into_iter().map(|entry| entry.message));

    if let Some(error) = step_error {
        outcome.status = UpdateStatus::Error;
        outcome.error = Some(error);
    } else if operations_performed {
        outcome.status = UpdateStatus::Ok;
        debug!("note {} updated", update.note_id);
    }
    // else: stays noop

    outcome
}

/// The schema to canonicalize a patch against is the note's own: its
/// current field keys when the info carries them, otherwise a fetch for its
/// model. An info with neither fields nor a model name yields an empty
/// schema, so any patch against it errors as unknown fields.
async fn effective_schema(
    client: &AnkiClient,
    cache: &mut SchemaCache,
    info: &NoteInfo,
) -> Result<ModelSchema, AnkipipeError> {
    if !info.fields.is_empty() {
        return Ok(ModelSchema::from_fields(info.field_names()));
    }
    match info.model_name.as_deref().filter(|name| !name.is_empty()) {
        Some(model_name) => {
            let schema = cache.resolve(client, model_name).await?;
            Ok((*schema).clone())
        }
        None => Ok(ModelSchema::from_fields(Vec::new())),
    }
}

fn coerce_patch_values(raw_fields: &Map<String, Value>) -> Map<String, Value> {
    let mut user_fields = Map::new();
    for (key, value) in raw_fields {
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
        user_fields.insert(key.clone(), Value::String(text));
    }
    user_fields
}
