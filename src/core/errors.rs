use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnkipipeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("AnkiConnect error: {0}")]
    Anki(String),

    #[error("{0}")]
    Validation(String),

    #[error("Unexpected AnkiConnect response: {0}")]
    Protocol(String),

    #[error("image payload is empty")]
    EmptyImagePayload,

    #[error("invalid base64 image data: {0}")]
    InvalidBase64(String),

    #[error("AnkipipeError: {0}")]
    Custom(String),
}

impl From<reqwest::Error> for AnkipipeError {
    fn from(error: reqwest::Error) -> Self {
        AnkipipeError::Reqwest(Box::new(error))
    }
}

impl From<base64::DecodeError> for AnkipipeError {
    fn from(error: base64::DecodeError) -> Self {
        AnkipipeError::InvalidBase64(error.to_string())
    }
}
