//! Domain layer for the RSA engine
//!
//! Core models, errors and the ports that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{ConfigError, RsaError, RsaResult};
