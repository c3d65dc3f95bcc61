//! Substrate adapter implementations.

pub mod cli_process;
pub mod mock;
pub mod registry;

pub use cli_process::{CliProcessConfig, CliProcessSubstrate};
pub use mock::{MockResponse, MockSubstrate};
pub use registry::SubstrateRegistry;
