use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use super::settings::Settings;
use crate::infrastructure::logging::logger::parse_log_level;

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".rsa";

/// Environment prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "RSA_";

/// Settings validation errors.
///
/// Run parameters are not checked here: they go through the normalizer,
/// which rejects bad values field by field.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Substrate binary path cannot be empty")]
    EmptyBinaryPath,

    #[error("Model provider cannot be empty")]
    EmptyProvider,

    #[error("Model id cannot be empty")]
    EmptyModelId,

    #[error("Invalid kill_grace_ms: {0}. Must be at most 60000")]
    InvalidKillGrace(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .rsa/config.yaml (project config)
    /// 3. .rsa/local.yaml (project local overrides, optional)
    /// 4. Environment variables (RSA_* prefix, highest priority)
    pub fn load() -> Result<Settings> {
        let settings: Settings = Self::figment(Path::new(CONFIG_DIR))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    fn figment(config_dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(settings: &Settings) -> Result<(), LoaderError> {
        if parse_log_level(&settings.logging.level).is_err() {
            return Err(LoaderError::InvalidLogLevel(settings.logging.level.clone()));
        }

        if settings.substrate.process.binary_path.trim().is_empty() {
            return Err(LoaderError::EmptyBinaryPath);
        }

        if settings.substrate.process.kill_grace_ms > 60_000 {
            return Err(LoaderError::InvalidKillGrace(
                settings.substrate.process.kill_grace_ms,
            ));
        }

        if settings.model.provider.trim().is_empty() {
            return Err(LoaderError::EmptyProvider);
        }

        if settings.model.id.trim().is_empty() {
            return Err(LoaderError::EmptyModelId);
        }

        Ok(())
    }
}
