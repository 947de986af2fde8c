use crate::error::Result;
use serde_json::{Map, Value};
use std::path::Path;

/// Keys probed, in order, when a record is a JSON object.
pub const TEXT_KEYS: [&str; 3] = ["page_content", "text", "content"];

/// Reference passages addressed by the same ids as the vector index.
///
/// Records are normalized to plain text once, at load time.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    texts: Vec<String>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of records.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading documents from {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        let records: Vec<Value> = serde_json::from_slice(&bytes)?;
        let store = Self::from_records(records);
        log::info!("Loaded {} documents", store.len());
        Ok(store)
    }

    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = Value>) -> Self {
        Self {
            texts: records.into_iter().map(|r| record_text(&r)).collect(),
        }
    }

    pub fn push(&mut self, text: impl Into<String>) -> usize {
        self.texts.push(text.into());
        self.texts.len() - 1
    }

    #[must_use]
    pub fn get(&self, id: usize) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Canonical text of one stored record.
///
/// A bare string is its own text. An object yields the first non-empty string
/// under [`TEXT_KEYS`], or its compact JSON form. Anything else is rendered as JSON.
#[must_use]
pub fn record_text(record: &Value) -> String {
    match record {
        Value::String(text) => text.clone(),
        Value::Object(fields) => object_text(fields).unwrap_or_else(|| record.to_string()),
        other => other.to_string(),
    }
}

fn object_text(fields: &Map<String, Value>) -> Option<String> {
    TEXT_KEYS.iter().find_map(|key| {
        fields
            .get(*key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(ToString::to_string)
    })
}
