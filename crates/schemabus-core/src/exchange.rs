//! Exchanges and the `datatype` stamp convention.
//!
//! Every exchange managed by schemabus is a fanout exchange carrying one
//! string argument, [`TYPE_ARG_NAME`], holding its serialized [`Schema`].
//! An exchange without a readable stamp exists on the broker but is unusable.

use crate::schema::{json_kind, Schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Exchange argument key holding the serialized schema.
pub const TYPE_ARG_NAME: &str = "datatype";

/// Broker-unique name of a fanout exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeName(String);

impl ExchangeName {
    /// Wrap a raw exchange name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ExchangeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A schema-stamped exchange, as provisioned or inspected.
#[derive(Debug, Clone)]
pub struct ExchangeDescriptor {
    /// Exchange name
    pub name: ExchangeName,
    /// Stamped schema
    pub schema: Schema,
    /// Whether the exchange survives broker restarts
    pub durable: bool,
}

impl ExchangeDescriptor {
    /// Descriptor for an exchange about to be provisioned.
    #[must_use]
    pub fn provisioned(name: ExchangeName, schema: Schema) -> Self {
        Self {
            name,
            schema,
            durable: true,
        }
    }

    /// Argument table stamping this descriptor's schema.
    #[must_use]
    pub fn arguments(&self) -> Map<String, Value> {
        let mut arguments = Map::new();
        arguments.insert(
            TYPE_ARG_NAME.to_string(),
            Value::String(self.schema.as_str().to_string()),
        );
        arguments
    }
}

/// An exchange as reported by the broker, before its stamp is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRecord {
    /// Exchange name
    pub name: ExchangeName,
    /// Whether the exchange is durable
    pub durable: bool,
    /// Raw argument table
    pub arguments: Map<String, Value>,
}

impl ExchangeRecord {
    /// Read the schema stamp.
    ///
    /// # Errors
    ///
    /// Returns error if the stamp is missing, not a string, empty, or not a
    /// schema document.
    pub fn stamp(&self) -> Result<Schema, StampError> {
        read_stamp(&self.arguments)
    }

    /// Interpret the record as a descriptor.
    ///
    /// # Errors
    ///
    /// Returns error if the stamp cannot be read.
    pub fn descriptor(&self) -> Result<ExchangeDescriptor, StampError> {
        Ok(ExchangeDescriptor {
            name: self.name.clone(),
            schema: self.stamp()?,
            durable: self.durable,
        })
    }
}

/// Read the schema stamp out of an exchange argument table.
///
/// # Errors
///
/// Returns error if the stamp is missing, not a string, empty, or not a
/// schema document.
pub fn read_stamp(arguments: &Map<String, Value>) -> Result<Schema, StampError> {
    let raw = arguments.get(TYPE_ARG_NAME).ok_or(StampError::Missing)?;
    let text = raw
        .as_str()
        .ok_or_else(|| StampError::NotAString(json_kind(raw)))?;
    if text.is_empty() {
        return Err(StampError::Empty);
    }
    Schema::parse(text).map_err(|e| StampError::Unreadable(e.to_string()))
}

/// Reasons a stamp cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StampError {
    /// No `datatype` argument
    #[error("no datatype argument")]
    Missing,
    /// The argument is not a string
    #[error("datatype argument is not a string (got {0})")]
    NotAString(&'static str),
    /// The argument is an empty string
    #[error("datatype argument is empty")]
    Empty,
    /// The argument is not a schema document
    #[error("datatype argument is unreadable: {0}")]
    Unreadable(String),
}
