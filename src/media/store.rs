use base64::{
    engine::general_purpose::STANDARD,
    Engine as _,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    anki::AnkiClient,
    core::AnkipipeError,
    media::payload::sanitize_image_payload,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMedia {
    pub filename: String,
    pub anki_response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub filename: String,
    pub data_base64: String,
    pub size_bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedMedia {
    pub filename: String,
    pub deleted: bool,
}

fn require_filename(filename: &str) -> Result<&str, AnkipipeError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(AnkipipeError::Validation("filename must be a non-empty string".to_string()));
    }
    Ok(trimmed)
}

/// Sanitizes the payload (bare base64 or data URL) and stores it under the
/// given filename.
pub async fn store_media(
    client: &AnkiClient,
    filename: &str,
    payload: &str,
) -> Result<StoredMedia, AnkipipeError> {
    let filename = require_filename(filename)?;
    let (clean_b64, _) = sanitize_image_payload(payload)?;
    let anki_response = client.store_media_file(filename, &clean_b64).await?;
    Ok(StoredMedia { filename: filename.to_string(), anki_response })
}

/// Retrieves a stored media file. AnkiConnect reports a missing file as
/// false; that maps to an error naming the file.
pub async fn get_media(client: &AnkiClient, filename: &str) -> Result<MediaFile, AnkipipeError> {
    let filename = require_filename(filename)?;
    let raw = client.retrieve_media_file(filename).await?;

    match raw {
        Value::String(data_base64) => {
            let size_bytes = STANDARD.decode(data_base64.as_bytes()).ok().map(|raw| raw.len());
            Ok(MediaFile { filename: filename.to_string(), data_base64, size_bytes })
        }
        Value::Bool(false) | Value::Null => {
            Err(AnkipipeError::Custom(format!("Media file '{}' not found", filename)))
        }
        other => Err(AnkipipeError::Protocol(format!(
            "retrieveMediaFile response must be a base64 string, got {}",
            other
        ))),
    }
}

pub async fn delete_media(
    client: &AnkiClient,
    filename: &str,
) -> Result<DeletedMedia, AnkipipeError> {
    let filename = require_filename(filename)?;
    let raw = client.delete_media_file(filename).await?;

    let deleted = match &raw {
        Value::Object(map) => map.get("deleted").map(value_truthy).unwrap_or(true),
        Value::Array(items) => items.iter().all(value_truthy),
        Value::Null | Value::Bool(true) => true,
        other => value_truthy(other),
    };
    Ok(DeletedMedia { filename: filename.to_string(), deleted })
}

fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn server_with_body(body: &str) -> (mockito::ServerGuard, AnkiClient) {
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
    async fn store_media_sanitizes_data_urls_first() {
        let (_server, client) =
            server_with_body(r#"{"result": "x.png", "error": null}"#).await;

        let stored =
            store_media(&client, "x.png", "data:image/png;base64,aGVsbG8=").await.unwrap();

        assert_eq!(stored.filename, "x.png");
        assert_eq!(stored.anki_response, serde_json::json!("x.png"));
    }

    #[tokio::test]
    async fn store_media_rejects_invalid_payloads_locally() {
        let client = AnkiClient::new("http://127.0.0.1:1").unwrap();
        let err = store_media(&client, "x.png", "not base64 at all!").await.unwrap_err();
        assert!(matches!(err, AnkipipeError::InvalidBase64(_)));

        let err = store_media(&client, "   ", "aGVsbG8=").await.unwrap_err();
        assert!(matches!(err, AnkipipeError::Validation(_)));
    }

    #[tokio::test]
    async fn get_media_reports_size_and_maps_false_to_not_found() {
        let (_server, client) =
            server_with_body(r#"{"result": "aGVsbG8=", "error": null}"#).await;
        let file = get_media(&client, "x.png").await.unwrap();
        assert_eq!(file.data_base64, "aGVsbG8=");
        assert_eq!(file.size_bytes, Some(5));

        let (_server, client) = server_with_body(r#"{"result": false, "error": null}"#).await;
        let err = get_media(&client, "gone.png").await.unwrap_err();
        assert!(err.to_string().contains("'gone.png'"));
    }

    #[tokio::test]
    async fn delete_media_consumes_varied_response_shapes() {
        let (_server, client) = server_with_body(r#"{"result": null, "error": null}"#).await;
        assert!(delete_media(&client, "x.png").await.unwrap().deleted);

        let (_server, client) =
            server_with_body(r#"{"result": {"deleted": false}, "error": null}"#).await;
        assert!(!delete_media(&client, "x.png").await.unwrap().deleted);

        let (_server, client) =
            server_with_body(r#"{"result": [true, true], "error": null}"#).await;
        assert!(delete_media(&client, "x.png").await.unwrap().deleted);
    }
}
