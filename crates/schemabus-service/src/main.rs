//! # schemabus Echo
//!
//! Example service: consumes `{"a": <string>}` and emits
//! `{"b": <twice the length of a>}`.
//!
//! Configured through `SCHEMABUS_*` environment variables; Ctrl+C stops it.

use anyhow::{Context, Result};
use schemabus_service::{Service, ServiceConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, JsonSchema)]
struct DataIn {
    a: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct DataOut {
    b: i64,
}

fn double_length(input: DataIn) -> Result<DataOut, String> {
    let len = i64::try_from(input.a.len()).map_err(|e| e.to_string())?;
    len.checked_mul(2)
        .map(|b| DataOut { b })
        .ok_or_else(|| "length overflow".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting schemabus echo");

    let config = ServiceConfig::from_env().context("Invalid configuration")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    let stats = Service::new(config)
        .liftoff(double_length, cancel)
        .await
        .context("Service failed")?;

    tracing::info!(
        processed = stats.processed,
        dropped = stats.dropped,
        publish_failures = stats.publish_failures,
        "Echo stopped"
    );
    Ok(())
}
