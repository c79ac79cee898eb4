//! Service runtime orchestration.

use crate::binder::{BindError, TopologyBinder};
use crate::binding::{BindingBuilder, ServiceBinding};
use crate::config::{ConfigError, Endpoints, ServiceConfig};
use crate::pump::{MessagePump, PumpError, PumpStats};
use crate::resolver::{ExchangeResolver, ResolveError};
use schemabus_adapter_amqp::{AmqpChannel, AmqpConfig, AmqpError, AmqpSession};
use schemabus_adapter_management::{ManagementClient, ManagementConfig, ManagementError};
use schemabus_core::{CompatibilityOracle, ExchangeName, QueueHandle, Schema};
use schemabus_subtype::StructuralOracle;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A schema-typed service: consumes `In`, publishes `Out`.
pub struct Service {
    config: ServiceConfig,
    oracle: Arc<dyn CompatibilityOracle>,
}

impl Service {
    /// Create a service using the structural oracle.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            oracle: Arc::new(StructuralOracle::new()),
        }
    }

    /// Replace the compatibility oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn CompatibilityOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Connect, resolve both exchanges, bind the queue, and run the pumps
    /// until they fail or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns error if any startup step fails or a pump stops on a
    /// transport error.
    pub async fn liftoff<In, Out, F, E>(
        self,
        handler: F,
        cancel: CancellationToken,
    ) -> Result<PumpStats, ServiceError>
    where
        In: DeserializeOwned + JsonSchema + 'static,
        Out: Serialize + JsonSchema + 'static,
        F: Fn(In) -> Result<Out, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let endpoints = self.config.endpoints()?;
        tracing::info!(
            service = %self.config.name,
            vhost = %endpoints.vhost,
            workers = self.config.workers,
            "Starting service"
        );

        let session = AmqpSession::connect(AmqpConfig {
            url: self.config.amqp_url.clone(),
            consumer_prefix: self.config.name.clone(),
        })
        .await
        .map_err(ServiceError::Connect)?;

        let outcome = self.run_session(&session, endpoints, handler, cancel).await;
        closing(outcome, session.close()).await
    }

    async fn run_session<In, Out, F, E>(
        &self,
        session: &AmqpSession,
        endpoints: Endpoints,
        handler: F,
        cancel: CancellationToken,
    ) -> Result<PumpStats, ServiceError>
    where
        In: DeserializeOwned + JsonSchema + 'static,
        Out: Serialize + JsonSchema + 'static,
        F: Fn(In) -> Result<Out, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let channel = session.open_channel().await.map_err(ServiceError::Connect)?;

        let management = ManagementClient::new(ManagementConfig {
            base_url: endpoints.api_base_url,
            vhost: endpoints.vhost,
            user: endpoints.api_credentials.user,
            password: endpoints.api_credentials.password,
            timeout: self.config.api_timeout,
        })
        .map_err(ServiceError::Api)?;
        let user = management.whoami().await.map_err(ServiceError::Api)?;
        tracing::info!(%user, "Connected to management API");

        let resolver = ExchangeResolver::new(Arc::new(management), self.oracle.clone());
        let binding = self
            .resolve_binding(&resolver, &Schema::derive::<In>(), &Schema::derive::<Out>())
            .await?;

        let queue = TopologyBinder::new(Arc::new(channel.clone()))
            .bind(binding.queue_name(), binding.listening_exchange())
            .await?;

        self.run_workers(&channel, &queue, &binding, Arc::new(handler), cancel)
            .await
    }

    async fn resolve_binding(
        &self,
        resolver: &ExchangeResolver,
        input: &Schema,
        output: &Schema,
    ) -> Result<ServiceBinding, ResolveError> {
        let listen = self.config.listen.as_deref().map(ExchangeName::new);
        let emit = ExchangeName::new(self.config.emit.as_str());

        let binding = BindingBuilder::new(self.config.name.as_str())
            .resolve_listening(resolver, listen.as_ref(), input)
            .await?
            .resolve_emitting(resolver, &emit, output)
            .await?
            .build();

        tracing::info!(
            queue = %binding.queue_name(),
            listening = %binding.listening_exchange(),
            emitting = %binding.emitting_exchange(),
            "Service bound"
        );
        Ok(binding)
    }

    async fn run_workers<In, Out, F, E>(
        &self,
        channel: &AmqpChannel,
        queue: &QueueHandle,
        binding: &ServiceBinding,
        handler: Arc<F>,
        cancel: CancellationToken,
    ) -> Result<PumpStats, ServiceError>
    where
        In: DeserializeOwned + 'static,
        Out: Serialize + 'static,
        F: Fn(In) -> Result<Out, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let workers_cancel = cancel.child_token();
        let mut workers = JoinSet::new();

        for worker in 0..self.config.workers {
            let deliveries = channel
                .consume(queue, self.config.auto_ack)
                .await
                .map_err(ServiceError::Consume)?;
            let mut pump = MessagePump::<In, Out, F>::new(
                Arc::new(channel.clone()),
                handler.clone(),
                binding.emitting_exchange().clone(),
                self.config.auto_ack,
            );
            let token = workers_cancel.clone();
            workers.spawn(async move {
                let outcome = pump.run(deliveries, token).await;
                (worker, outcome, pump.stats())
            });
        }

        let mut total = PumpStats::default();
        let mut failure = None;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((worker, outcome, stats)) => {
                    total += stats;
                    if let Err(err) = outcome {
                        tracing::error!(worker, error = %err, "Worker stopped");
                        workers_cancel.cancel();
                        failure.get_or_insert(ServiceError::Pump(err));
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Worker task failed");
                    workers_cancel.cancel();
                    failure.get_or_insert(ServiceError::Worker(err.to_string()));
                }
            }
        }

        tracing::info!(
            processed = total.processed,
            dropped = total.dropped,
            publish_failures = total.publish_failures,
            "Service stopped"
        );

        match failure {
            Some(err) => Err(err),
            None => Ok(total),
        }
    }
}

/// Await the connection close, then hand back `outcome` unchanged.
async fn closing<T>(
    outcome: Result<T, ServiceError>,
    close: impl Future<Output = Result<(), AmqpError>>,
) -> Result<T, ServiceError> {
    if let Err(err) = close.await {
        tracing::debug!(error = %err, "Connection close failed");
    }
    outcome
}

/// Errors that stop a service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The broker connection failed
    #[error("can not connect to RMQ: {0}")]
    Connect(#[source] AmqpError),
    /// The management API failed
    #[error("can not connect RMQ API: {0}")]
    Api(#[source] ManagementError),
    /// Exchange resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The service queue could not be set up
    #[error(transparent)]
    Bind(#[from] BindError),
    /// A consumer could not be registered
    #[error("can not consume queue: {0}")]
    Consume(#[source] AmqpError),
    /// A pump stopped on a transport error
    #[error(transparent)]
    Pump(#[from] PumpError),
    /// A worker task panicked or was aborted
    #[error("worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn startup_failure_still_closes_connection() {
        let closed = AtomicBool::new(false);
        let failure: Result<PumpStats, ServiceError> =
            Err(ServiceError::Worker("resolution failed".to_string()));

        let err = closing(failure, async {
            closed.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(err.to_string(), "worker failed: resolution failed");
    }

    #[tokio::test]
    async fn close_failure_keeps_outcome() {
        let stats = PumpStats {
            processed: 3,
            ..PumpStats::default()
        };

        let outcome = closing(Ok(stats), async {
            Err(AmqpError::Connection("already closed".to_string()))
        })
        .await
        .unwrap();

        assert_eq!(outcome, stats);
    }
}
