//! Bridges loosely-structured flashcard input to a local AnkiConnect
//! endpoint: field canonicalization against live model schemas, embedded
//! image extraction and storage, batched note creation and per-note
//! partial updates, plus thin typed wrappers for deck/model/tag/media
//! housekeeping.

pub mod anki;
pub mod config;
pub mod core;
pub mod decks;
pub mod media;
pub mod models;
pub mod notes;
pub mod search;

pub use anki::AnkiClient;
pub use config::BridgeConfig;
pub use core::AnkipipeError;
