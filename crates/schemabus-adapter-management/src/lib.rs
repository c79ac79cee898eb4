//! # Management Adapter
//!
//! RabbitMQ management API client used to inspect, list, and provision
//! schema-stamped exchanges on a single virtual host.
//!
//! ## Encoding Rules
//!
//! - Virtual host and exchange names are percent-encoded path segments
//! - The default virtual host `/` is sent as `%2F`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod encoding;

pub use client::{
    ExchangeInfo, ExchangeSettings, ManagementClient, ManagementConfig, ManagementError,
};
pub use encoding::{decode_segment, encode_segment, EncodingError};
