use std::collections::HashMap;

use serde_json::{
    Map,
    Value,
};

use crate::core::AnkipipeError;

/// Maps arbitrarily-cased user keys onto the model's canonical fields.
/// The output covers every canonical field (unmatched ones become "");
/// returns (canonicalFields, matchedCount, sorted unknown user keys).
pub fn canonicalize(
    user_fields: &Map<String, Value>,
    ordered_fields: &[String],
) -> (Map<String, Value>, usize, Vec<String>) {
    let mut lower_map: HashMap<String, &str> = HashMap::new();
    for key in user_fields.keys() {
        lower_map.insert(key.to_lowercase(), key.as_str());
    }

    let mut canonical = Map::new();
    let mut matched_keys: Vec<&str> = Vec::new();
    for model_field in ordered_fields {
        match lower_map.get(&model_field.to_lowercase()) {
            Some(key) => {
                let value =
                    user_fields.get(*key).and_then(Value::as_str).unwrap_or_default().to_string();
                canonical.insert(model_field.clone(), Value::String(value));
                matched_keys.push(key);
            }
            None => {
                canonical.insert(model_field.clone(), Value::String(String::new()));
            }
        }
    }

    let mut unknown_keys: Vec<String> = user_fields
        .keys()
        .filter(|key| !matched_keys.contains(&key.as_str()))
        .cloned()
        .collect();
    unknown_keys.sort();

    (canonical, matched_keys.len(), unknown_keys)
}

/// Canonicalize and enforce the primary-field rule: at least one user key
/// must match, and the value landing in the first canonical field must be
/// non-empty. The error message names both the rejected and expected keys.
pub fn canonicalize_validated(
    user_fields: &Map<String, Value>,
    ordered_fields: &[String],
) -> Result<Map<String, Value>, AnkipipeError> {
    let primary = match ordered_fields.first() {
        Some(primary) => primary.as_str(),
        None => {
            return Err(AnkipipeError::Validation("Model has no fields configured".to_string()));
        }
    };

    let (canonical, matched_count, unknown_keys) = canonicalize(user_fields, ordered_fields);

    let primary_empty =
        canonical.get(primary).and_then(Value::as_str).map(str::is_empty).unwrap_or(true);
    if matched_count == 0 || primary_empty {
        return Err(AnkipipeError::Validation(format!(
            "Unknown note fields: [{}]. Expected fields: [{}]. Ensure required field '{}' is provided.",
            quote_join(&unknown_keys),
            quote_join(ordered_fields),
            primary
        )));
    }

    Ok(canonical)
}

pub(crate) fn quote_join(names: &[String]) -> String {
    names.iter().map(|name| format!("'{}'", name)).collect::<Vec<_>>().join(", ")
}
