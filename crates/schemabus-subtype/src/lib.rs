//! # schemabus Subtype
//!
//! A structural [`CompatibilityOracle`](schemabus_core::CompatibilityOracle)
//! for the JSON Schema dialect `schemars` derives.
//!
//! Services never depend on this crate directly for their binding logic; it
//! is injected at startup, and any other oracle honoring the same four-way
//! contract can take its place.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod subsume;

pub use subsume::{is_subschema, StructuralOracle};
