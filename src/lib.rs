//! RSA - Recursive Self-Aggregation
//!
//! Test-time scaling for language models: a population of independent
//! answers is generated in parallel, then repeatedly recombined by asking
//! the model to merge small random subsets of the previous population. The
//! final population is reduced to one answer by majority vote.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the substrate/progress ports
//! - **Service Layer** (`services`): Normalization, sampling, prompting, the engine
//! - **Adapters** (`adapters`): Model CLI process and mock substrates
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rsa_engine::adapters::substrates::MockSubstrate;
//! use rsa_engine::{normalize, ConfigOverrides, EngineProfile, ModelRef, RsaEngine};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = normalize(
//!     &ConfigOverrides::default().with_population_size(4).with_steps(2),
//!     EngineProfile::default(),
//! )?
//! .config;
//! let engine = RsaEngine::new(Arc::new(MockSubstrate::new()));
//! let result = engine
//!     .run("What is 6*7?", &config, &ModelRef::default(), None, None)
//!     .await?;
//! println!("{:?}", result.final_answer);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, RsaError, RsaResult};
pub use domain::models::{
    Candidate, ConfigOverrides, EngineProfile, ModelRef, Population, ProgressEvent, RunConfig,
    RunResult, SelectionMethod, StepTrace, ThinkingLevel, TraceMode,
};
pub use domain::ports::{ChannelProgress, NullProgress, ProgressSink, Substrate};
pub use infrastructure::config::{ConfigLoader, LoaderError, Settings};
pub use services::{normalize, RsaEngine};
