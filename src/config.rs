use std::env;

pub const DEFAULT_ANKI_URL: &str = "http://127.0.0.1:8765";
pub const DEFAULT_DECK: &str = "Default";
pub const DEFAULT_MODEL: &str = "Basic";

/// Settings shared by every top-level operation. Built once at startup;
/// nothing in the pipeline reads the environment after that.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub anki_url: String,
    pub default_deck: String,
    pub default_model: String,
    pub search_api_url: Option<String>,
    pub search_api_key: Option<String>,
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        BridgeConfig {
            anki_url: env::var("ANKI_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_ANKI_URL.to_string()),
            default_deck: env::var("ANKI_DEFAULT_DECK")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DECK.to_string()),
            default_model: env::var("ANKI_DEFAULT_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            search_api_url: env::var("SEARCH_API_URL").ok().filter(|v| !v.trim().is_empty()),
            search_api_key: env::var("SEARCH_API_KEY").ok().filter(|v| !v.trim().is_empty()),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            anki_url: DEFAULT_ANKI_URL.to_string(),
            default_deck: DEFAULT_DECK.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            search_api_url: None,
            search_api_key: None,
        }
    }
}
