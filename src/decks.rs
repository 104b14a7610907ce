use std::collections::HashMap;

use serde_json::Value;

use crate::{
    anki::{
        AnkiClient,
        DeckInfo,
    },
    core::AnkipipeError,
};

/// Lists every deck with its id, in the order the collection reports them.
pub async fn list_decks(client: &AnkiClient) -> Result<Vec<DeckInfo>, AnkipipeError> {
    let raw = client.deck_names_and_ids().await?;
    let mapping = match &raw {
        Value::Null => return Ok(Vec::new()),
        Value::Object(mapping) => mapping,
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "deckNamesAndIds response must be a mapping of deck names to ids, got {}",
                other
            )));
        }
    };

    mapping
        .iter()
        .map(|(name, raw_id)| {
            let id = coerce_id(raw_id).ok_or_else(|| {
                AnkipipeError::Protocol(format!(
                    "deckNamesAndIds returned non-integer deck id for '{}': {}",
                    name, raw_id
                ))
            })?;
            Ok(DeckInfo { id, name: name.clone() })
        })
        .collect()
}

pub async fn create_deck(client: &AnkiClient, name: &str) -> Result<Value, AnkipipeError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AnkipipeError::Validation("deck must be a non-empty string".to_string()));
    }
    client.create_deck(trimmed).await
}

/// Lists all tags, deduplicated case-insensitively (first-seen spelling
/// wins) and sorted case-insensitively with the exact spelling as the
/// tie-breaker.
pub async fn list_tags(client: &AnkiClient) -> Result<Vec<String>, AnkipipeError> {
    let raw = client.get_tags().await?;
    let entries = match &raw {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "getTags response must be a sequence of strings, got {}",
                other
            )));
        }
    };

    let mut seen: HashMap<String, String> = HashMap::new();
    let mut unique: Vec<String> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let tag = entry.as_str().ok_or_else(|| {
            AnkipipeError::Protocol(format!(
                "getTags returned non-string value at index {}: {}",
                index, entry
            ))
        })?;
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if !seen.contains_key(&key) {
            seen.insert(key, trimmed.to_string());
            unique.push(trimmed.to_string());
        }
    }

    unique.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    Ok(unique)
}

pub(crate) fn coerce_id(raw: &Value) -> Option<u64> {
    match raw {
        Value::Number(number) => {
            number.as_u64().or_else(|| number.as_f64().map(|n| n as u64))
        }
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn server_with_body(body: String) -> (mockito::ServerGuard, AnkiClient) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        let client = AnkiClient::new(&server.url()).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn list_decks_coerces_ids() {
        let (_server, client) = server_with_body(
            json!({"result": {"Default": 1, "Inbox": "17"}, "error": null}).to_string(),
        )
        .await;

        let decks = list_decks(&client).await.unwrap();

        assert_eq!(decks.len(), 2);
        assert!(decks.contains(&DeckInfo { id: 1, name: "Default".to_string() }));
        assert!(decks.contains(&DeckInfo { id: 17, name: "Inbox".to_string() }));
    }

    #[tokio::test]
    async fn list_decks_rejects_non_mapping_responses() {
        let (_server, client) =
            server_with_body(json!({"result": [1, 2], "error": null}).to_string()).await;

        let err = list_decks(&client).await.unwrap_err();
        assert!(matches!(err, AnkipipeError::Protocol(_)));
    }

    #[tokio::test]
    async fn create_deck_rejects_blank_names() {
        let client = AnkiClient::new("http://127.0.0.1:1").unwrap();
        let err = create_deck(&client, "   ").await.unwrap_err();
        assert!(matches!(err, AnkipipeError::Validation(_)));
    }

    #[tokio::test]
    async fn list_tags_dedups_case_insensitively_keeping_first_spelling() {
        let (_server, client) = server_with_body(
            json!({"result": ["Verb", "noun", "VERB", "adjective"], "error": null}).to_string(),
        )
        .await;

        let tags = list_tags(&client).await.unwrap();

        assert_eq!(tags, vec!["adjective", "noun", "Verb"]);
    }

    #[tokio::test]
    async fn list_tags_rejects_non_string_entries() {
        let (_server, client) =
            server_with_body(json!({"result": ["ok", 5], "error": null}).to_string()).await;

        let err = list_tags(&client).await.unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }
}
