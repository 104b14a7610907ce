use serde_json::Value;

use crate::{
    anki::{
        AnkiClient,
        ModelInfo,
        ModelSummary,
    },
    config::BridgeConfig,
    core::AnkipipeError,
    decks::coerce_id,
};

/// Lists every note model with its id, sorted case-insensitively by name
/// (exact spelling breaks ties).
pub async fn list_models(client: &AnkiClient) -> Result<Vec<ModelSummary>, AnkipipeError> {
    let raw = client.model_names_and_ids().await?;
    let mapping = match &raw {
        Value::Null => return Ok(Vec::new()),
        Value::Object(mapping) => mapping,
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "modelNamesAndIds response must be a mapping of model names to ids, got {}",
                other
            )));
        }
    };

    let mut models = mapping
        .iter()
        .map(|(name, raw_id)| {
            let id = coerce_id(raw_id).ok_or_else(|| {
                AnkipipeError::Protocol(format!(
                    "modelNamesAndIds returned non-integer model id for '{}': {}",
                    name, raw_id
                ))
            })?;
            Ok(ModelSummary { id, name: name.clone() })
        })
        .collect::<Result<Vec<_>, AnkipipeError>>()?;

    models.sort_by(|a, b| {
        a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.name.cmp(&b.name))
    });
    Ok(models)
}

/// Fetches a model's fields, card templates and styling in one struct.
/// With no model given, the configured default model is described.
pub async fn model_info(
    client: &AnkiClient,
    config: &BridgeConfig,
    model: Option<&str>,
) -> Result<ModelInfo, AnkipipeError> {
    let target = model
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(config.default_model.as_str());

    let fields = client.model_field_names(target).await?;
    let templates = client.model_templates(target).await?;
    let styling = client.model_styling(target).await?;
    let css = styling
        .as_object()
        .and_then(|map| map.get("css"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(ModelInfo { model: target.to_string(), fields, templates, styling: css })
}
