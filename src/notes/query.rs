use serde::Serialize;
use serde_json::Value;

use crate::{
    anki::{
        normalize_notes_info,
        AnkiClient,
        NoteInfo,
    },
    core::AnkipipeError,
};

pub const DEFAULT_FIND_LIMIT: usize = 25;
pub const MAX_FIND_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindNotesResult {
    pub total: usize,
    pub note_ids: Vec<u64>,
    pub notes: Vec<Option<NoteInfo>>,
}

#[derive(Debug, Serialize)]
pub struct DeleteNotesResult {
    pub requested: usize,
    pub deleted: usize,
    pub missing: usize,
}

/// Runs an Anki search query and hydrates the requested window of matches.
/// `total` counts every match; `note_ids` and `notes` cover the window
/// only, aligned by position (a None note means the id vanished between
/// the two calls).
pub async fn find_notes(
    client: &AnkiClient,
    query: &str,
    limit: Option<usize>,
    offset: usize,
) -> Result<FindNotesResult, AnkipipeError> {
    if query.trim().is_empty() {
        return Err(AnkipipeError::Validation("query must be a non-empty string".to_string()));
    }
    let limit = limit.unwrap_or(DEFAULT_FIND_LIMIT);
    if limit < 1 || limit > MAX_FIND_LIMIT {
        return Err(AnkipipeError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_FIND_LIMIT
        )));
    }

    let raw_ids = client.find_notes(query.trim()).await?;
    let all_ids = parse_id_list(&raw_ids, "findNotes")?;

    let window: Vec<u64> =
        all_ids.iter().skip(offset).take(limit).copied().collect();

    let notes = if window.is_empty() {
        Vec::new()
    } else {
        let raw_notes = client.notes_info(&window).await?;
        normalize_notes_info(&raw_notes)?
    };

    Ok(FindNotesResult { total: all_ids.len(), note_ids: window, notes })
}

/// Fetches one note's current state; a missing note is an error naming the
/// id rather than an empty result.
pub async fn note_info(client: &AnkiClient, note_id: u64) -> Result<NoteInfo, AnkipipeError> {
    let raw = client.notes_info(&[note_id]).await?;
    let notes = normalize_notes_info(&raw)?;
    notes
        .into_iter()
        .flatten()
        .find(|note| note.note_id == note_id)
        .ok_or_else(|| AnkipipeError::Custom(format!("Note {} was not found", note_id)))
}

/// Deletes notes by id. AnkiConnect normally answers null (everything
/// deleted); numeric and list results from other builds are consumed
/// leniently.
pub async fn delete_notes(
    client: &AnkiClient,
    note_ids: &[u64],
) -> Result<DeleteNotesResult, AnkipipeError> {
    if note_ids.is_empty() {
        return Err(AnkipipeError::Validation(
            "note_ids must contain at least one id".to_string(),
        ));
    }

    let response = client.delete_notes(note_ids).await?;
    let requested = note_ids.len();

    let deleted = match &response {
        Value::Null => requested,
        Value::Number(number) => {
            let count = number.as_u64().unwrap_or(0) as usize;
            count.min(requested)
        }
        Value::Array(items) => {
            let mut count = 0;
            for item in items {
                match item {
                    Value::Bool(true) | Value::Number(_) => count += 1,
                    _ => {}
                }
            }
            count.min(requested)
        }
        _ => requested,
    };

    Ok(DeleteNotesResult { requested, deleted, missing: requested - deleted })
}

fn parse_id_list(raw: &Value, action: &str) -> Result<Vec<u64>, AnkipipeError> {
    let entries = raw.as_array().ok_or_else(|| {
        AnkipipeError::Protocol(format!("{} response must be a list of note ids", action))
    })?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            Value::Number(number) => number.as_u64().ok_or_else(|| {
                AnkipipeError::Protocol(format!(
                    "{} returned non-integer value at index {}: {}",
                    action, index, number
                ))
            }),
            other => Err(AnkipipeError::Protocol(format!(
                "{} returned non-integer value at index {}: {}",
                action, index, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn action_mock(
        server: &mut mockito::ServerGuard,
        action: &str,
        result: Value,
    ) -> mockito::Mock {
        server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({ "action": action })))
            .with_header("content-type", "application/json")
            .with_body(json!({ "result": result, "error": null }).to_string())
    }

    #[tokio::test]
    async fn find_notes_windows_ids_and_hydrates_them() {
        let mut server = mockito::Server::new_async().await;
        let _find = action_mock(&mut server, "findNotes", json!([1, 2, 3, 4])).create_async().await;
        let info = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({
                "action": "notesInfo",
                "params": { "notes": [2, 3] }
            })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "result": [
                        {"noteId": 2, "fields": {"Front": "a"}},
                        {"noteId": 3, "fields": {"Front": "b"}}
                    ],
                    "error": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let result = find_notes(&client, "deck:Default", Some(2), 1).await.unwrap();

        assert_eq!(result.total, 4);
        assert_eq!(result.note_ids, vec![2, 3]);
        assert_eq!(result.notes.len(), 2);
        assert_eq!(result.notes[0].as_ref().unwrap().note_id, 2);
        info.assert_async().await;
    }

    #[tokio::test]
    async fn find_notes_validates_inputs_and_response() {
        let client = AnkiClient::new("http://127.0.0.1:1").unwrap();
        assert!(find_notes(&client, "  ", None, 0).await.is_err());
        assert!(find_notes(&client, "x", Some(0), 0).await.is_err());
        assert!(find_notes(&client, "x", Some(101), 0).await.is_err());

        let mut server = mockito::Server::new_async().await;
        let _find =
            action_mock(&mut server, "findNotes", json!([1, "bad"])).create_async().await;
        let client = AnkiClient::new(&server.url()).unwrap();
        let err = find_notes(&client, "x", None, 0).await.unwrap_err();
        assert!(err.to_string().contains("non-integer value at index 1"));
    }

    #[tokio::test]
    async fn empty_window_skips_the_hydration_call() {
        let mut server = mockito::Server::new_async().await;
        let _find = action_mock(&mut server, "findNotes", json!([1])).create_async().await;
        let info = action_mock(&mut server, "notesInfo", json!([]))
            .expect(0)
            .create_async()
            .await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let result = find_notes(&client, "x", None, 5).await.unwrap();

        assert_eq!(result.total, 1);
        assert!(result.note_ids.is_empty());
        assert!(result.notes.is_empty());
        info.assert_async().await;
    }

    #[tokio::test]
    async fn note_info_errors_on_missing_notes() {
        let mut server = mockito::Server::new_async().await;
        let _info = action_mock(&mut server, "notesInfo", json!([null])).create_async().await;

        let client = AnkiClient::new(&server.url()).unwrap();
        let err = note_info(&client, 77).await.unwrap_err();
        assert!(err.to_string().contains("77"));
    }

    #[tokio::test]
    async fn delete_notes_consumes_null_count_and_list_results() {
        let mut server = mockito::Server::new_async().await;
        let _delete = action_mock(&mut server, "deleteNotes", json!(null)).create_async().await;
        let client = AnkiClient::new(&server.url()).unwrap();
        let result = delete_notes(&client, &[1, 2, 3]).await.unwrap();
        assert_eq!((result.deleted, result.missing), (3, 0));

        let mut server = mockito::Server::new_async().await;
        let _delete = action_mock(&mut server, "deleteNotes", json!(2)).create_async().await;
        let client = AnkiClient::new(&server.url()).unwrap();
        let result = delete_notes(&client, &[1, 2, 3]).await.unwrap();
        assert_eq!((result.deleted, result.missing), (2, 1));

        let mut server = mockito::Server::new_async().await;
        let _delete =
            action_mock(&mut server, "deleteNotes", json!([true, false, 9])).create_async().await;
        let client = AnkiClient::new(&server.url()).unwrap();
        let result = delete_notes(&client, &[1, 2, 3]).await.unwrap();
        assert_eq!((result.deleted, result.missing), (2, 1));
    }

    #[tokio::test]
    async fn delete_notes_requires_ids() {
        let client = AnkiClient::new("http://127.0.0.1:1").unwrap();
        assert!(delete_notes(&client, &[]).await.is_err());
    }
}
