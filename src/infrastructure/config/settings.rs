use serde::{Deserialize, Serialize};

use crate::adapters::substrates::CliProcessConfig;
use crate::domain::models::{ConfigOverrides, EngineProfile, ModelRef, SubstrateType};
use crate::infrastructure::logging::LogConfig;

/// Everything the `rsa` binary reads from files and the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run parameter overrides, normalized before every run
    pub run: ConfigOverrides,
    pub engine: EngineProfile,
    pub model: ModelRef,
    pub substrate: SubstrateSettings,
    pub logging: LogConfig,
}

/// Which substrate to call and how to launch it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateSettings {
    pub kind: SubstrateType,
    pub process: CliProcessConfig,
}
