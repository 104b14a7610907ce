pub mod client;
pub mod schema;
pub mod types;

pub use client::{
    AnkiClient,
    ApiResponse,
};
pub use schema::{
    ModelSchema,
    SchemaCache,
};
pub use types::{
    normalize_notes_info,
    DeckInfo,
    ModelInfo,
    ModelSummary,
    NoteInfo,
};
