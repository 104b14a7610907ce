use std::time::Duration;

use serde::Serialize;
use serde_json::{
    json,
    Value,
};
use tracing::debug;

use crate::{
    config::BridgeConfig,
    core::AnkipipeError,
};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
pub const MAX_SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Value>,
}

/// Proxies a query to the configured external search service, attaching the
/// bearer token when one is set. Responses are normalized from the
/// results/items and nextCursor/next_cursor spellings different services
/// use.
pub async fn search(
    config: &BridgeConfig,
    query: &str,
    limit: Option<u32>,
    cursor: Option<&str>,
) -> Result<SearchResponse, AnkipipeError> {
    let base_url = config.search_api_url.as_deref().ok_or_else(|| {
        AnkipipeError::Validation("search is not configured: SEARCH_API_URL is unset".to_string())
    })?;

    let query = query.trim();
    if query.is_empty() {
        return Err(AnkipipeError::Validation("query must be a non-empty string".to_string()));
    }
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if limit < 1 || limit > MAX_SEARCH_LIMIT {
        return Err(AnkipipeError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_SEARCH_LIMIT
        )));
    }

    let mut payload = json!({ "query": query, "limit": limit });
    if let Some(cursor) = cursor.map(str::trim).filter(|c| !c.is_empty()) {
        payload["cursor"] = Value::String(cursor.to_string());
    }

    let client = reqwest::Client::builder().timeout(SEARCH_TIMEOUT).build()?;
    let mut request = client.post(base_url).json(&payload);
    if let Some(key) = &config.search_api_key {
        request = request.bearer_auth(key);
    }

    debug!("search request: {} result(s) max", limit);
    let raw: Value = request.send().await?.error_for_status()?.json().await?;
    normalize_search_payload(raw)
}

fn normalize_search_payload(raw: Value) -> Result<SearchResponse, AnkipipeError> {
    let mut payload = match raw {
        Value::Object(payload) => payload,
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "Search API response must be a JSON object, got {}",
                other
            )));
        }
    };

    let results = payload
        .remove("results")
        .or_else(|| payload.remove("items"))
        .ok_or_else(|| {
            AnkipipeError::Protocol("Search API response is missing 'results'".to_string())
        })?;
    let results = match results {
        Value::Array(results) => results,
        other => {
            return Err(AnkipipeError::Protocol(format!(
                "Search API 'results' must be a list, got {}",
                other
            )));
        }
    };

    let next_cursor = ["nextCursor", "next_cursor", "nextPageToken", "next_page_token"]
        .iter()
        .find_map(|key| payload.remove(*key))
        .filter(|value| !value.is_null());

    Ok(SearchResponse { results, next_cursor })
}
