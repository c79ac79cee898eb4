//! Broker capabilities the binding protocol depends on.
//!
//! The management plane ([`ExchangeRegistry`]) and the data plane
//! ([`QueueTopology`], [`Publisher`], [`Delivery`]) are traits so the
//! resolver and the pump can run against a live broker or an in-memory fake.

use crate::exchange::{ExchangeDescriptor, ExchangeName, ExchangeRecord};
use async_trait::async_trait;

/// Exchange metadata on a single virtual host.
#[async_trait]
pub trait ExchangeRegistry: Send + Sync {
    /// Look up one exchange. `Ok(None)` means the broker reported it absent.
    async fn get_exchange(&self, name: &ExchangeName)
        -> Result<Option<ExchangeRecord>, BrokerError>;

    /// All exchanges, in the order the broker returns them.
    async fn list_exchanges(&self) -> Result<Vec<ExchangeRecord>, BrokerError>;

    /// Create a fanout exchange stamped with the descriptor's schema.
    async fn declare_exchange(&self, descriptor: &ExchangeDescriptor) -> Result<(), BrokerError>;
}

/// Parameters of a queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name
    pub name: String,
    /// Survives broker restarts
    pub durable: bool,
    /// Deleted when the last consumer goes away
    pub auto_delete: bool,
}

impl QueueSpec {
    /// A queue private to one service: non-durable, auto-delete.
    #[must_use]
    pub fn service_private(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: true,
        }
    }
}

/// A declared queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueHandle {
    /// Queue name as confirmed by the broker
    pub name: String,
}

/// Queue declaration and binding.
#[async_trait]
pub trait QueueTopology: Send + Sync {
    /// Declare a queue. Declaring an existing queue with identical
    /// parameters succeeds.
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<QueueHandle, BrokerError>;

    /// Bind a queue to an exchange with an empty routing key.
    async fn bind_queue(
        &self,
        queue: &QueueHandle,
        exchange: &ExchangeName,
    ) -> Result<(), BrokerError>;
}

/// Publishing to a fanout exchange.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a JSON payload with an empty routing key.
    async fn publish(&self, exchange: &ExchangeName, payload: &[u8]) -> Result<(), BrokerError>;
}

/// One message handed out by a consumer.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Raw message body.
    fn payload(&self) -> &[u8];

    /// Broker-assigned delivery tag.
    fn tag(&self) -> u64;

    /// Acknowledge the message as consumed.
    async fn ack(&self) -> Result<(), BrokerError>;
}

/// Errors reported by broker capabilities.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// The request could not be sent or answered
    #[error("request error: {0}")]
    Request(String),
    /// The management API returned an error status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body
        message: String,
    },
    /// A response could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
    /// An AMQP channel operation failed
    #[error("channel error: {0}")]
    Channel(String),
}
