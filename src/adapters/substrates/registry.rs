//! Substrate registry and factory.

use std::sync::Arc;

use crate::domain::models::SubstrateType;
use crate::domain::ports::Substrate;

use super::cli_process::{CliProcessConfig, CliProcessSubstrate};
use super::mock::{MockResponse, MockSubstrate};

/// Builds substrates from configuration.
pub struct SubstrateRegistry {
    process_config: CliProcessConfig,
    mock_response: MockResponse,
}

impl SubstrateRegistry {
    pub fn new() -> Self {
        Self {
            process_config: CliProcessConfig::default(),
            mock_response: MockResponse::default(),
        }
    }

    pub fn with_process_config(mut self, config: CliProcessConfig) -> Self {
        self.process_config = config;
        self
    }

    pub fn with_mock_response(mut self, response: MockResponse) -> Self {
        self.mock_response = response;
        self
    }

    /// Create a substrate by type.
    pub fn create_by_type(&self, substrate_type: SubstrateType) -> Arc<dyn Substrate> {
        match substrate_type {
            SubstrateType::Process => {
                Arc::new(CliProcessSubstrate::new(self.process_config.clone()))
            }
            SubstrateType::Mock => Arc::new(MockSubstrate::with_default_response(
                self.mock_response.clone(),
            )),
        }
    }

    /// Create a substrate by name, if the name is known.
    pub fn create(&self, substrate_type: &str) -> Option<Arc<dyn Substrate>> {
        SubstrateType::from_str(substrate_type).map(|t| self.create_by_type(t))
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        vec![SubstrateType::Process.as_str(), SubstrateType::Mock.as_str()]
    }
}

impl Default for SubstrateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_by_type() {
        let registry = SubstrateRegistry::new();

        let process = registry.create_by_type(SubstrateType::Process);
        assert_eq!(process.name(), "process");

        let mock = registry.create_by_type(SubstrateType::Mock);
        assert_eq!(mock.name(), "mock");
    }

    #[test]
    fn test_create_by_name() {
        let registry = SubstrateRegistry::new();

        assert!(registry.create("cli").is_some());
        assert!(registry.create("mock").is_some());
        assert!(registry.create("invalid").is_none());
        assert_eq!(registry.available_types(), vec!["process", "mock"]);
    }
}
