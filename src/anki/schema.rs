use std::{
    collections::HashMap,
    sync::Arc,
};

use crate::{
    anki::client::AnkiClient,
    core::AnkipipeError,
};

/// Canonical field list for one model plus a lowercased alias map for
/// case-insensitive lookups. Index 0 is the required primary field.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub fields: Vec<String>,
    alias_map: HashMap<String, String>,
}

impl ModelSchema {
    pub fn from_fields(fields: Vec<String>) -> Self {
        let mut alias_map = HashMap::new();
        for field in &fields {
            alias_map.insert(field.to_lowercase(), field.clone());
        }
        ModelSchema { fields, alias_map }
    }

    pub fn primary_field(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }

    /// Canonical spelling for an arbitrarily-cased field name.
    pub fn resolve_alias(&self, name: &str) -> Option<&str> {
        self.alias_map.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Request-scoped memo of model schemas. Lives for one batch invocation so
/// notes sharing a model trigger a single modelFieldNames fetch; nothing is
/// cached across top-level calls.
#[derive(Debug, Default)]
pub struct SchemaCache {
    models: HashMap<String, Arc<ModelSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        SchemaCache { models: HashMap::new() }
    }

    pub async fn resolve(
        &mut self,
        client: &AnkiClient,
        model_name: &str,
    ) -> Result<Arc<ModelSchema>, AnkipipeError> {
        if let Some(schema) = self.models.get(model_name) {
            return Ok(schema.clone());
        }

        let fields = client.model_field_names(model_name).await?;
        if fields.is_empty() {
            return Err(AnkipipeError::Validation("Model has no fields configured".to_string()));
        }

        let schema = Arc::new(ModelSchema::from_fields(fields));
        self.models.insert(model_name.to_string(), schema.clone());
        Ok(schema)
    }
}
