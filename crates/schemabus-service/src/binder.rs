//! Service queue declaration and binding.

use schemabus_core::{BrokerError, ExchangeName, QueueHandle, QueueSpec, QueueTopology};
use std::sync::Arc;

/// Declares a service's queue and binds it to the listening exchange.
#[derive(Clone)]
pub struct TopologyBinder {
    topology: Arc<dyn QueueTopology>,
}

impl TopologyBinder {
    /// Create a binder over a queue topology.
    #[must_use]
    pub fn new(topology: Arc<dyn QueueTopology>) -> Self {
        Self { topology }
    }

    /// Declare a non-durable, auto-delete queue and bind it with an empty
    /// routing key. Safe to repeat with the same arguments.
    ///
    /// # Errors
    ///
    /// Returns error if the declaration or the binding fails.
    pub async fn bind(
        &self,
        queue_name: &str,
        exchange: &ExchangeName,
    ) -> Result<QueueHandle, BindError> {
        let spec = QueueSpec::service_private(queue_name);

        let queue = self
            .topology
            .declare_queue(&spec)
            .await
            .map_err(|source| BindError::Declare {
                queue: queue_name.to_string(),
                source,
            })?;

        self.topology
            .bind_queue(&queue, exchange)
            .await
            .map_err(|source| BindError::Bind {
                queue: queue.name.clone(),
                exchange: exchange.clone(),
                source,
            })?;

        tracing::info!(queue = %queue.name, exchange = %exchange, "Queue bound");
        Ok(queue)
    }
}

/// Errors that can occur while binding the service queue.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Queue declaration failed
    #[error("can not create queue {queue}: {source}")]
    Declare {
        /// Queue name
        queue: String,
        /// Underlying failure
        source: BrokerError,
    },
    /// Binding the queue failed
    #[error("can not bind queue {queue} to {exchange}: {source}")]
    Bind {
        /// Queue name
        queue: String,
        /// Listening exchange
        exchange: ExchangeName,
        /// Underlying failure
        source: BrokerError,
    },
}
