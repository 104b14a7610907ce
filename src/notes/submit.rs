use serde::Serialize;
use serde_json::{
    json,
    Value,
};
use tracing::debug;

use crate::{
    anki::{
        AnkiClient,
        SchemaCache,
    },
    config::BridgeConfig,
    core::AnkipipeError,
    media::{
        apply_image_requests,
        auto_link_urls,
        extract_data_urls,
        MediaLog,
        TargetFieldPolicy,
    },
    notes::{
        draft::NoteDraft,
        fields::canonicalize_validated,
    },
};

#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub added: usize,
    pub skipped: usize,
    pub details: Vec<SubmissionDetail>,
}

/// Per-note outcome of one batched add, positionally aligned with the
/// submitted drafts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
    pub index: usize,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Ok,
    Duplicate,
}

/// Creates a batch of typed drafts. Image target fields that do not exist
/// on the model fail the batch before anything is submitted.
pub async fn add_notes(
    client: &AnkiClient,
    config: &BridgeConfig,
    drafts: &[NoteDraft],
) -> Result<SubmissionResult, AnkipipeError> {
    submit_drafts(
        client,
        &config.default_deck,
        &config.default_model,
        drafts,
        TargetFieldPolicy::Strict,
    )
    .await
}

/// Creates a batch from raw JSON items (nested or flat note shapes),
/// resolved through the boundary constructor. Unresolvable image targets
/// only warn here.
pub async fn add_from_model(
    client: &AnkiClient,
    config: &BridgeConfig,
    deck: Option<&str>,
    model: Option<&str>,
    items: &[Value],
) -> Result<SubmissionResult, AnkipipeError> {
    let drafts = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            NoteDraft::from_value(item).map_err(|error| {
                AnkipipeError::Validation(format!("Invalid note at index {}: {}", index, error))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let deck =
        deck.map(str::trim).filter(|d| !d.is_empty()).unwrap_or(config.default_deck.as_str());
    let model =
        model.map(str::trim).filter(|m| !m.is_empty()).unwrap_or(config.default_model.as_str());
    submit_drafts(client, deck, model, &drafts, TargetFieldPolicy::Lenient).await
}

async fn submit_drafts(
    client: &AnkiClient,
    default_deck: &str,
    default_model: &str,
    drafts: &[NoteDraft],
    policy: TargetFieldPolicy,
) -> Result<SubmissionResult, AnkipipeError> {
    if drafts.is_empty() {
        return Err(AnkipipeError::Validation("at least one note is required".to_string()));
    }

    // Union of effective decks, first-seen order; each created once.
    let mut decks: Vec<&str> = vec![default_deck];
    for draft in drafts {
        if let Some(deck) = draft.deck.as_deref() {
            if !decks.contains(&deck) {
                decks.push(deck);
            }
        }
    }
    for deck in &decks {
        client.create_deck(deck).await?;
    }

    let mut cache = SchemaCache::new();
    let mut payloads: Vec<Value> = Vec::with_capacity(drafts.len());
    let mut note_warnings: Vec<Vec<String>> = Vec::with_capacity(drafts.len());

    for (index, draft) in drafts.iter().enumerate() {
        let note_deck = draft.deck.as_deref().unwrap_or(default_deck);
        let note_model = draft.model.as_deref().unwrap_or(default_model);

        let schema = cache.resolve(client, note_model).await?;
        let mut fields = canonicalize_validated(&draft.fields, &schema.fields)?;

        for name in &schema.fields {
            if name.to_lowercase() == "sources" {
                if let Some(text) = fields.get(name).and_then(Value::as_str) {
                    let linked = auto_link_urls(text);
                    fields.insert(name.clone(), Value::String(linked));
                }
            }
        }

        let mut sink: Vec<MediaLog> = Vec::new();
        extract_data_urls(client, &mut fields, &mut sink, index).await;
        apply_image_requests(
            client,
            &draft.images,
            &mut fields,
            &schema,
            None,
            policy,
            &mut sink,
            index,
        )
        .await?;

        let mut warnings = Vec::new();
        for entry in sink {
            if entry.is_warning() {
                warnings.push(entry.message);
            } else {
                debug!("note {}: {}", index, entry.message);
            }
        }
        note_warnings.push(warnings);

        payloads.push(json!({
            "deckName": note_deck,
            "modelName": note_model,
            "fields": fields,
            "tags": draft.tags,
            "options": { "allowDuplicate": false },
        }));
    }

    // One irreversible batched call; any transport failure here aborts the
    // whole batch.
    let note_ids = client.add_notes(&payloads).await?;
    if note_ids.len() != drafts.len() {
        return Err(AnkipipeError::Protocol(format!(
            "addNotes returned {} results for {} submitted notes",
            note_ids.len(),
            drafts.len()
        )));
    }

    let mut added = 0;
    let mut skipped = 0;
    let mut details = Vec::with_capacity(drafts.len());
    for (index, (note_id, warnings)) in note_ids.into_iter().zip(note_warnings).enumerate() {
        let status = match note_id {
            Some(_) => {
                added += 1;
                SubmissionStatus::Ok
            }
            None => {
                skipped += 1;
                SubmissionStatus::Duplicate
            }
        };
        details.push(SubmissionDetail {
            index,
            status,
            note_id,
            dedup_key: drafts[index].dedup_key.clone(),
            warnings,
        });
    }

    Ok(SubmissionResult { added, skipped, details })
}
