//! Deliveries handed to the message pump.

use crate::connection::AmqpError;
use async_trait::async_trait;
use lapin::message;
use lapin::options::BasicAckOptions;
use schemabus_core::{BrokerError, Delivery};

/// A message received from the broker.
pub struct AmqpDelivery {
    inner: message::Delivery,
}

impl AmqpDelivery {
    pub(crate) fn new(inner: message::Delivery) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Delivery for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.inner.data
    }

    fn tag(&self) -> u64 {
        self.inner.delivery_tag
    }

    async fn ack(&self) -> Result<(), BrokerError> {
        self.inner
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?;
        Ok(())
    }
}
