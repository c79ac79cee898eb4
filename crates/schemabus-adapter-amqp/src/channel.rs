//! Queue topology, publishing, and consuming on one AMQP channel.

use crate::connection::AmqpError;
use crate::delivery::AmqpDelivery;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel};
use schemabus_core::{
    BrokerError, ExchangeName, Publisher, QueueHandle, QueueSpec, QueueTopology,
};
use uuid::Uuid;

/// Content type stamped on every published message.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Stream of deliveries from one consumer.
pub type DeliveryStream = BoxStream<'static, Result<AmqpDelivery, AmqpError>>;

/// A channel shared by topology setup, publishers, and consumers.
#[derive(Clone)]
pub struct AmqpChannel {
    channel: Channel,
    consumer_prefix: String,
}

impl AmqpChannel {
    pub(crate) fn new(channel: Channel, consumer_prefix: String) -> Self {
        Self {
            channel,
            consumer_prefix,
        }
    }

    /// Start consuming a queue.
    ///
    /// With `auto_ack` the broker considers messages acknowledged on
    /// delivery and explicit acks must not be sent.
    ///
    /// # Errors
    ///
    /// Returns error if the consumer cannot be registered.
    pub async fn consume(
        &self,
        queue: &QueueHandle,
        auto_ack: bool,
    ) -> Result<DeliveryStream, AmqpError> {
        let tag = format!("{}-{}", self.consumer_prefix, Uuid::new_v4());
        tracing::info!(queue = %queue.name, consumer_tag = %tag, auto_ack, "Starting consumer");

        let consumer = self
            .channel
            .basic_consume(
                &queue.name,
                &tag,
                BasicConsumeOptions {
                    no_ack: auto_ack,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?;

        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(AmqpDelivery::new)
                    .map_err(|e| AmqpError::Consumer(e.to_string()))
            })
            .boxed())
    }
}

/// Declaration options for a queue spec.
#[must_use]
pub fn declare_options(spec: &QueueSpec) -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: spec.durable,
        auto_delete: spec.auto_delete,
        ..QueueDeclareOptions::default()
    }
}

#[async_trait]
impl QueueTopology for AmqpChannel {
    async fn declare_queue(&self, spec: &QueueSpec) -> Result<QueueHandle, BrokerError> {
        tracing::debug!(queue = %spec.name, durable = spec.durable, auto_delete = spec.auto_delete, "Declaring queue");

        let queue = self
            .channel
            .queue_declare(&spec.name, declare_options(spec), FieldTable::default())
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?;

        Ok(QueueHandle {
            name: queue.name().as_str().to_string(),
        })
    }

    async fn bind_queue(
        &self,
        queue: &QueueHandle,
        exchange: &ExchangeName,
    ) -> Result<(), BrokerError> {
        tracing::debug!(queue = %queue.name, exchange = %exchange, "Binding queue");

        self.channel
            .queue_bind(
                &queue.name,
                exchange.as_str(),
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Publisher for AmqpChannel {
    async fn publish(&self, exchange: &ExchangeName, payload: &[u8]) -> Result<(), BrokerError> {
        tracing::debug!(exchange = %exchange, payload_len = payload.len(), "Publishing message");

        self.channel
            .basic_publish(
                exchange.as_str(),
                "",
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_content_type(JSON_CONTENT_TYPE.into()),
            )
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?
            .await
            .map_err(|e| AmqpError::Channel(e.to_string()))?;

        Ok(())
    }
}
