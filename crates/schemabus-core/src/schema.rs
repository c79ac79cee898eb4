//! Structural schemas derived from Rust types.
//!
//! A [`Schema`] is the canonical JSON Schema document of a message type. The
//! same document is stamped on broker exchanges as a string argument and fed
//! unmodified to a [`CompatibilityOracle`](crate::CompatibilityOracle).
//!
//! Canonical form means every object in the document has its keys sorted, so
//! deriving the same type twice always yields byte-identical stamps.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The structural shape of a message payload.
///
/// Not `PartialEq`: schemas are compared through an oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Schema {
    document: Value,
    text: String,
}

impl Schema {
    /// Derive the schema of a Rust type.
    ///
    /// Deterministic: the same type always produces the same stamp.
    #[must_use]
    pub fn derive<T: JsonSchema>() -> Self {
        let generated = schemars::schema_for!(T);
        Self::from_canonical(canonicalize(generated.to_value()))
    }

    /// Parse a schema from its stamped string form.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not JSON or not a schema document
    /// (an object or a boolean).
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a schema from an already parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns error if the value is neither an object nor a boolean.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(_) | Value::Bool(_) => Ok(Self::from_canonical(canonicalize(value))),
            other => Err(SchemaError::NotADocument(json_kind(&other))),
        }
    }

    fn from_canonical(document: Value) -> Self {
        let text = document.to_string();
        Self { document, text }
    }

    /// The JSON Schema document.
    #[must_use]
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The stamped string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<Schema> for String {
    fn from(schema: Schema) -> Self {
        schema.text
    }
}

impl TryFrom<String> for Schema {
    type Error = SchemaError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

/// Rebuild every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, child) in entries {
                sorted.insert(key, canonicalize(child));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        scalar => scalar,
    }
}

/// Human-readable JSON kind, used in error messages.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Errors that can occur when reading a schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// The text is not valid JSON
    #[error("schema is not valid JSON: {0}")]
    InvalidJson(String),
    /// The JSON value cannot be a schema document
    #[error("schema must be an object or a boolean, got {0}")]
    NotADocument(&'static str),
}
