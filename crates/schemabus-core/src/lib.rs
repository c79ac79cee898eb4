//! # schemabus Core
//!
//! Shared vocabulary for schema-typed services on an AMQP broker.
//!
//! This crate provides:
//! - [`Schema`]: canonical JSON Schema derived from a Rust type
//! - [`CompatibilityOracle`]: the four-way structural comparison contract
//! - Exchange names, descriptors, and the `datatype` stamp convention
//! - Broker ports implemented by the management and AMQP adapters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod exchange;
pub mod oracle;
pub mod ports;
pub mod schema;

pub use exchange::{
    read_stamp, ExchangeDescriptor, ExchangeName, ExchangeRecord, StampError, TYPE_ARG_NAME,
};
pub use oracle::{CompatibilityOracle, OracleError, TypesIdentity};
pub use ports::{
    BrokerError, Delivery, ExchangeRegistry, Publisher, QueueHandle, QueueSpec, QueueTopology,
};
pub use schema::{Schema, SchemaError};
