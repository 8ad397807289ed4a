//! Core types and error definitions for the Tenure session store.
//!
//! This crate provides the pieces shared by every Tenure crate: the unified
//! error enum and the store configuration.
//!
//! # Main types
//!
//! - [`TenureError`] — Unified error enum (configuration, persistence, serialization).
//! - [`TenureResult`] — Convenience alias for `Result<T, TenureError>`.
//! - [`TenureConfig`] — Parsed `tenure.toml` ([`StoreConfig`] + [`SweepConfig`]).

/// Store and sweeper configuration.
pub mod config;
/// Error types.
pub mod error;

pub use config::{validate_ttl, StoreConfig, SweepConfig, TenureConfig};
pub use error::{TenureError, TenureResult};
