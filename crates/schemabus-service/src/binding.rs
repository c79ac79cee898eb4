//! Staged construction of a [`ServiceBinding`].
//!
//! Each stage consumes the previous one, so a binding cannot exist without
//! both exchanges resolved:
//!
//! ```
//! use schemabus_core::ExchangeName;
//! use schemabus_service::BindingBuilder;
//!
//! let binding = BindingBuilder::new("doubler")
//!     .listening(ExchangeName::new("words"))
//!     .emitting(ExchangeName::new("doubled"))
//!     .build();
//!
//! assert_eq!(binding.queue_name(), "doubler");
//! assert_eq!(binding.listening_exchange().as_str(), "words");
//! ```

use crate::resolver::{ExchangeResolver, ResolveError, Role};
use schemabus_core::{ExchangeName, Schema};

/// The exchanges and queue a running service is attached to. Immutable once
/// built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    listening_exchange: ExchangeName,
    emitting_exchange: ExchangeName,
    queue_name: String,
}

impl ServiceBinding {
    /// Exchange the service queue is bound to.
    #[must_use]
    pub fn listening_exchange(&self) -> &ExchangeName {
        &self.listening_exchange
    }

    /// Exchange results are published to.
    #[must_use]
    pub fn emitting_exchange(&self) -> &ExchangeName {
        &self.emitting_exchange
    }

    /// Name of the service queue.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

/// First stage: only the queue name is known.
#[derive(Debug)]
pub struct BindingBuilder {
    queue_name: String,
}

/// Second stage: the listening exchange is resolved.
#[derive(Debug)]
pub struct WithListening {
    queue_name: String,
    listening_exchange: ExchangeName,
}

/// Third stage: both exchanges are resolved.
#[derive(Debug)]
pub struct WithEmitting {
    queue_name: String,
    listening_exchange: ExchangeName,
    emitting_exchange: ExchangeName,
}

impl BindingBuilder {
    /// Start a binding for the queue `queue_name`.
    #[must_use]
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
        }
    }

    /// Record the listening exchange.
    #[must_use]
    pub fn listening(self, exchange: ExchangeName) -> WithListening {
        WithListening {
            queue_name: self.queue_name,
            listening_exchange: exchange,
        }
    }

    /// Resolve the listening exchange: by name when one is given,
    /// otherwise by searching the vhost.
    ///
    /// # Errors
    ///
    /// Returns error if no acceptable listening exchange can be resolved.
    pub async fn resolve_listening(
        self,
        resolver: &ExchangeResolver,
        name: Option<&ExchangeName>,
        input: &Schema,
    ) -> Result<WithListening, ResolveError> {
        let exchange = match name {
            Some(name) => resolver.resolve_named(name, input, Role::Listening).await?.name,
            None => resolver.search_suitable(input).await?.0,
        };
        Ok(self.listening(exchange))
    }
}

impl WithListening {
    /// Record the emitting exchange.
    #[must_use]
    pub fn emitting(self, exchange: ExchangeName) -> WithEmitting {
        WithEmitting {
            queue_name: self.queue_name,
            listening_exchange: self.listening_exchange,
            emitting_exchange: exchange,
        }
    }

    /// Resolve the emitting exchange by name.
    ///
    /// # Errors
    ///
    /// Returns error if the exchange's stamp does not accept `output`.
    pub async fn resolve_emitting(
        self,
        resolver: &ExchangeResolver,
        name: &ExchangeName,
        output: &Schema,
    ) -> Result<WithEmitting, ResolveError> {
        let descriptor = resolver.resolve_named(name, output, Role::Emitting).await?;
        Ok(self.emitting(descriptor.name))
    }
}

impl WithEmitting {
    /// Finish the binding.
    #[must_use]
    pub fn build(self) -> ServiceBinding {
        ServiceBinding {
            listening_exchange: self.listening_exchange,
            emitting_exchange: self.emitting_exchange,
            queue_name: self.queue_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::{narrow, wide, MemoryRegistry};
    use schemabus_subtype::StructuralOracle;
    use serde_json::Value;
    use std::sync::Arc;

    fn resolver(registry: Arc<MemoryRegistry>) -> ExchangeResolver {
        ExchangeResolver::new(registry, Arc::new(StructuralOracle::new()))
    }

    #[tokio::test]
    async fn resolves_named_exchanges() {
        let registry = Arc::new(MemoryRegistry::default());
        let resolver = resolver(registry.clone());

        let binding = BindingBuilder::new("doubler")
            .resolve_listening(&resolver, Some(&ExchangeName::new("words")), &narrow())
            .await
            .unwrap()
            .resolve_emitting(&resolver, &ExchangeName::new("doubled"), &wide())
            .await
            .unwrap()
            .build();

        assert_eq!(binding.queue_name(), "doubler");
        assert_eq!(binding.listening_exchange().as_str(), "words");
        assert_eq!(binding.emitting_exchange().as_str(), "doubled");
        assert_eq!(registry.declared().len(), 2);
        assert_eq!(registry.stamp_of("words"), Some(Value::from(narrow().as_str())));
        assert_eq!(registry.stamp_of("doubled"), Some(Value::from(wide().as_str())));
    }

    #[tokio::test]
    async fn narrower_emitting_stamp_stops_the_builder() {
        let registry = Arc::new(MemoryRegistry::default().stamped("doubled", &narrow()));
        let resolver = resolver(registry.clone());

        let err = BindingBuilder::new("doubler")
            .listening(ExchangeName::new("words"))
            .resolve_emitting(&resolver, &ExchangeName::new("doubled"), &wide())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::IncompatibleTypes { .. }));
        assert!(registry.declared().is_empty());
    }

    #[tokio::test]
    async fn searches_when_no_listening_name() {
        let registry = Arc::new(MemoryRegistry::default().stamped("sentences", &wide()));
        let resolver = resolver(registry);

        let stage = BindingBuilder::new("doubler")
            .resolve_listening(&resolver, None, &narrow())
            .await
            .unwrap();

        let binding = stage.emitting(ExchangeName::new("doubled")).build();
        assert_eq!(binding.listening_exchange().as_str(), "sentences");
    }

    #[tokio::test]
    async fn search_failure_stops_the_builder() {
        let resolver = resolver(Arc::new(MemoryRegistry::default()));

        let err = BindingBuilder::new("doubler")
            .resolve_listening(&resolver, None, &narrow())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoSuitableExchange));
    }
}
