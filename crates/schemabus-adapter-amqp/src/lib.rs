//! # AMQP Adapter
//!
//! Data-plane side of schemabus over `lapin`:
//! - service queue declaration and fanout binding
//! - publishing JSON payloads (`content-type: application/json`)
//! - consuming deliveries as a stream for the message pump
//!
//! Exchanges are never declared here; provisioning goes through the
//! management API so the schema stamp is set atomically with creation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod connection;
pub mod delivery;

pub use channel::{declare_options, AmqpChannel, DeliveryStream, JSON_CONTENT_TYPE};
pub use connection::{parse_amqp_url, AmqpConfig, AmqpEndpoint, AmqpError, AmqpSession};
pub use delivery::AmqpDelivery;
