use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::json;
use tracing::debug;

use crate::{
    config::BridgeConfig,
    core::AnkipipeError,
};

const ANKI_CONNECT_VERSION: u32 = 6;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub result: Option<T>,
    pub error: Option<String>,
}

/// Client for a local AnkiConnect endpoint. One instance per process is
/// enough; the underlying reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct AnkiClient {
    http: reqwest::Client,
    base_url: String,
}

impl AnkiClient {
    pub fn new(base_url: &str) -> Result<Self, AnkipipeError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(AnkiClient { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, AnkipipeError> {
        AnkiClient::new(&config.anki_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One AnkiConnect round trip: POST {action, version, params}, check the
    /// error field, hand back the result field. A null result comes back as
    /// None; a non-null error is raised verbatim.
    pub async fn invoke<T: for<'de> Deserialize<'de>>(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, AnkipipeError> {
        if action.trim().is_empty() {
            return Err(AnkipipeError::Validation(
                "action must be a non-empty string".to_string(),
            ));
        }

        let mut body = serde_json::Map::new();
        body.insert("action".to_string(), serde_json::Value::String(action.to_string()));
        body.insert("version".to_string(), serde_json::Value::Number(ANKI_CONNECT_VERSION.into()));
        body.insert("params".to_string(), params);

        debug!("AnkiConnect request: {}", action);
        let response: ApiResponse<T> = self
            .http
            .post(&self.base_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.error {
            Some(error) if !error.is_empty() => Err(AnkipipeError::Anki(error)),
            _ => Ok(response.result),
        }
    }

    /// Like invoke, but keeps the raw JSON result (null included) for actions
    /// whose response shape varies across AnkiConnect versions.
    pub async fn invoke_value(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AnkipipeError> {
        let result: Option<serde_json::Value> = self.invoke(action, params).await?;
        Ok(result.unwrap_or(serde_json::Value::Null))
    }

    pub async fn version(&self) -> Result<u32, AnkipipeError> {
        let version: Option<u32> = self.invoke("version", json!({})).await?;
        version.ok_or_else(|| AnkipipeError::Protocol("version returned no result".to_string()))
    }

    pub async fn model_field_names(&self, model_name: &str) -> Result<Vec<String>, AnkipipeError> {
        let fields: Option<Vec<String>> =
            self.invoke("modelFieldNames", json!({ "modelName": model_name })).await?;
        Ok(fields.unwrap_or_default())
    }

    pub async fn create_deck(&self, deck: &str) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("createDeck", json!({ "deck": deck })).await
    }

    pub async fn store_media_file(
        &self,
        filename: &str,
        data_base64: &str,
    ) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("storeMediaFile", json!({ "filename": filename, "data": data_base64 }))
            .await
    }

    pub async fn retrieve_media_file(
        &self,
        filename: &str,
    ) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("retrieveMediaFile", json!({ "filename": filename })).await
    }

    pub async fn delete_media_file(
        &self,
        filename: &str,
    ) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("deleteMediaFile", json!({ "filename": filename })).await
    }

    pub async fn add_notes(
        &self,
        notes: &[serde_json::Value],
    ) -> Result<Vec<Option<u64>>, AnkipipeError> {
        let ids: Option<Vec<Option<u64>>> =
            self.invoke("addNotes", json!({ "notes": notes })).await?;
        ids.ok_or_else(|| AnkipipeError::Protocol("addNotes returned no result".to_string()))
    }

    pub async fn notes_info(&self, note_ids: &[u64]) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("notesInfo", json!({ "notes": note_ids })).await
    }

    pub async fn find_notes(&self, query: &str) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("findNotes", json!({ "query": query })).await
    }

    pub async fn delete_notes(&self, note_ids: &[u64]) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("deleteNotes", json!({ "notes": note_ids })).await
    }

    pub async fn update_note_fields(
        &self,
        note_id: u64,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AnkipipeError> {
        self.invoke_value("updateNoteFields", json!({ "note": { "id": note_id, "fields": fields } }))
            .await?;
        Ok(())
    }

    pub async fn add_tags(&self, note_ids: &[u64], tags: &str) -> Result<(), AnkipipeError> {
        self.invoke_value("addTags", json!({ "notes": note_ids, "tags": tags })).await?;
        Ok(())
    }

    pub async fn remove_tags(&self, note_ids: &[u64], tags: &str) -> Result<(), AnkipipeError> {
        self.invoke_value("removeTags", json!({ "notes": note_ids, "tags": tags })).await?;
        Ok(())
    }

    pub async fn change_deck(&self, card_ids: &[u64], deck: &str) -> Result<(), AnkipipeError> {
        self.invoke_value("changeDeck", json!({ "cards": card_ids, "deck": deck })).await?;
        Ok(())
    }

    pub async fn deck_names_and_ids(&self) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("deckNamesAndIds", json!({})).await
    }

    pub async fn model_names_and_ids(&self) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("modelNamesAndIds", json!({})).await
    }

    pub async fn model_templates(&self, model_name: &str) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("modelTemplates", json!({ "modelName": model_name })).await
    }

    pub async fn model_styling(&self, model_name: &str) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("modelStyling", json!({ "modelName": model_name })).await
    }

    pub async fn get_tags(&self) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("getTags", json!({})).await
    }

    pub async fn sync(&self) -> Result<serde_json::Value, AnkipipeError> {
        self.invoke_value("sync", json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn invoke_unwraps_result_and_sends_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "action": "version",
                "version": 6,
                "params": {}
            })))
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": 6, "error": null}"#)
            .create_async()
            .await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let version = client.version().await.unwrap();

        assert_eq!(version, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remote_error_string_is_raised_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": null, "error": "collection is not available"}"#)
            .create_async()
            .await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let err = client.version().await.unwrap_err();

        match err {
            AnkipipeError::Anki(message) => assert_eq!(message, "collection is not available"),
            other => panic!("expected Anki error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_action_is_rejected_before_any_request() {
        let client = AnkiClient::new("http://127.0.0.1:1").unwrap();
        let err = client.invoke_value("   ", json!({})).await.unwrap_err();

        match err {
            AnkipipeError::Validation(message) => {
                assert_eq!(message, "action must be a non-empty string")
            }
            other => panic!("expected Validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn null_result_maps_to_json_null() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": null, "error": null}"#)
            .create_async()
            .await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let result = client.invoke_value("deleteNotes", json!({ "notes": [1] })).await.unwrap();

        assert!(result.is_null());
    }
}
