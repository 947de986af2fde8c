//! Pulling one structured value out of free-form model text.
//!
//! Models wrap JSON in prose and code fences. A fenced ```` ```json ```` block
//! wins when present; otherwise parsing starts at the first `{` and consumes
//! exactly one JSON value, ignoring whatever trails it.

use crate::error::ExtractError;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Deserializer, Map, Value};
use std::sync::OnceLock;

fn fenced_block() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```").ok())
        .as_ref()
}

/// Extracts the single JSON object a model reply is meant to contain.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let candidate = fenced_block().and_then(|re| {
        re.captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|body| body.starts_with('{'))
    });

    let value = match candidate {
        Some(body) => first_value(body)?,
        None => {
            let start = text.find('{').ok_or(ExtractError::NotFound)?;
            first_value(&text[start..])?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ExtractError::NotAnObject),
    }
}

/// Extracts the reply's JSON object and deserializes it into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let map = extract_json_object(text)?;
    Ok(serde_json::from_value(Value::Object(map))?)
}

fn first_value(text: &str) -> Result<Value, ExtractError> {
    Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()
        .ok_or(ExtractError::NotFound)?
        .map_err(ExtractError::from)
}
