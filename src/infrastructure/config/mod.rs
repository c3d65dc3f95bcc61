//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation

pub mod loader;
pub mod settings;

pub use loader::{ConfigLoader, LoaderError};
pub use settings::{Settings, SubstrateSettings};
