//! Exchange resolution.
//!
//! A service's listening and emitting exchanges are found (or provisioned)
//! here before any queue is declared.
//!
//! ## Acceptance Rules
//!
//! `compare(exchange stamp, service schema)` decides, per role:
//!
//! | Role      | Accepted identities                       |
//! |-----------|-------------------------------------------|
//! | Listening | `Equal`, `AIsSupertypeOfB` (stamp wider)  |
//! | Emitting  | `Equal`, `AIsSupertypeOfB` (stamp wider)  |
//!
//! An existing exchange is never modified.

use schemabus_core::{
    BrokerError, CompatibilityOracle, ExchangeDescriptor, ExchangeName, ExchangeRegistry,
    OracleError, Schema, StampError, TypesIdentity,
};
use std::fmt;
use std::sync::Arc;

/// Which side of an exchange a service is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The service consumes from the exchange
    Listening,
    /// The service publishes to the exchange
    Emitting,
}

impl Role {
    /// Whether `identity = compare(stamp, service schema)` is acceptable
    /// for this role.
    #[must_use]
    pub fn accepts(self, identity: TypesIdentity) -> bool {
        match self {
            Self::Listening => identity.b_within_a(),
            Self::Emitting => identity.b_within_a(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listening => f.write_str("listen"),
            Self::Emitting => f.write_str("emit"),
        }
    }
}

/// Resolves exchanges against the broker's registry.
#[derive(Clone)]
pub struct ExchangeResolver {
    registry: Arc<dyn ExchangeRegistry>,
    oracle: Arc<dyn CompatibilityOracle>,
}

impl ExchangeResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(registry: Arc<dyn ExchangeRegistry>, oracle: Arc<dyn CompatibilityOracle>) -> Self {
        Self { registry, oracle }
    }

    /// Resolve a named exchange for `role`, creating it stamped with
    /// `required` when the broker does not know it.
    ///
    /// # Errors
    ///
    /// Returns error if the registry fails, the exchange has no usable
    /// stamp, the oracle cannot decide, or the stamp is incompatible.
    pub async fn resolve_named(
        &self,
        name: &ExchangeName,
        required: &Schema,
        role: Role,
    ) -> Result<ExchangeDescriptor, ResolveError> {
        let record = self
            .registry
            .get_exchange(name)
            .await
            .map_err(|source| ResolveError::Registry {
                exchange: name.clone(),
                source,
            })?;

        let Some(record) = record else {
            tracing::info!(exchange = %name, %role, "Exchange not found, provisioning");
            let descriptor = ExchangeDescriptor::provisioned(name.clone(), required.clone());
            self.registry
                .declare_exchange(&descriptor)
                .await
                .map_err(|source| ResolveError::Registry {
                    exchange: name.clone(),
                    source,
                })?;
            return Ok(descriptor);
        };

        let descriptor =
            record
                .descriptor()
                .map_err(|source| ResolveError::MisconfiguredExchange {
                    exchange: name.clone(),
                    source,
                })?;

        let identity = self
            .oracle
            .compare(&descriptor.schema, required)
            .map_err(|source| ResolveError::Undecidable {
                exchange: name.clone(),
                source,
            })?;

        if !role.accepts(identity) {
            tracing::warn!(exchange = %name, %role, ?identity, "Exchange schema incompatible");
            return Err(ResolveError::IncompatibleTypes {
                exchange: name.clone(),
                role,
                identity,
            });
        }

        tracing::info!(exchange = %name, %role, ?identity, "Exchange resolved");
        Ok(descriptor)
    }

    /// Find the first exchange, in broker order, a listener with input
    /// schema `required` may bind to.
    ///
    /// Exchanges without a usable stamp and exchanges the oracle cannot
    /// decide on are skipped.
    ///
    /// # Errors
    ///
    /// Returns error if the exchanges cannot be listed or none is suitable.
    pub async fn search_suitable(
        &self,
        required: &Schema,
    ) -> Result<(ExchangeName, Schema), ResolveError> {
        let records = self
            .registry
            .list_exchanges()
            .await
            .map_err(ResolveError::Listing)?;

        tracing::debug!(candidates = records.len(), "Searching for a suitable exchange");

        for record in records {
            let stamp = match record.stamp() {
                Ok(stamp) => stamp,
                Err(err) => {
                    tracing::debug!(exchange = %record.name, error = %err, "Skipping exchange");
                    continue;
                }
            };

            match self.oracle.compare(&stamp, required) {
                Ok(identity) if Role::Listening.accepts(identity) => {
                    tracing::info!(exchange = %record.name, ?identity, "Found suitable exchange");
                    return Ok((record.name, stamp));
                }
                Ok(identity) => {
                    tracing::debug!(exchange = %record.name, ?identity, "Skipping exchange");
                }
                Err(err) => {
                    tracing::debug!(exchange = %record.name, error = %err, "Skipping exchange");
                }
            }
        }

        Err(ResolveError::NoSuitableExchange)
    }
}

/// Errors that stop exchange resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The registry could not be queried or updated
    #[error("can not get exchange {exchange}: {source}")]
    Registry {
        /// Exchange being resolved
        exchange: ExchangeName,
        /// Underlying failure
        source: BrokerError,
    },
    /// The exchange list could not be fetched
    #[error("can not get list of exchanges: {0}")]
    Listing(#[source] BrokerError),
    /// The exchange exists but carries no usable stamp
    #[error("exchange {exchange} is misconfigured: {source}")]
    MisconfiguredExchange {
        /// Offending exchange
        exchange: ExchangeName,
        /// What is wrong with the stamp
        source: StampError,
    },
    /// The oracle could not compare the stamp with the service schema
    #[error("can not compare schema of exchange {exchange}: {source}")]
    Undecidable {
        /// Exchange being resolved
        exchange: ExchangeName,
        /// Oracle failure
        source: OracleError,
    },
    /// The stamp does not stand in the relation the role requires
    #[error("can not {role} event {exchange}: incompatible types ({identity:?})")]
    IncompatibleTypes {
        /// Offending exchange
        exchange: ExchangeName,
        /// Role the service wanted
        role: Role,
        /// Oracle verdict for `compare(stamp, service schema)`
        identity: TypesIdentity,
    },
    /// No exchange in the vhost accepts the service's input
    #[error("no suitable exchange found")]
    NoSuitableExchange,
}
