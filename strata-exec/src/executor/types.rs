use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PARALLELISM: usize = 10;

/// Engine tuning, loadable from a JSON or YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of vertices evaluated at once.
    pub parallelism: usize,
    /// Tighter limits for individual provider types.
    pub per_provider_concurrency: BTreeMap<String, usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            per_provider_concurrency: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_str_auto(&raw)
    }

    /// JSON when the document starts with `{`, YAML otherwise.
    pub fn from_str_auto(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = if raw.trim_start().starts_with('{') {
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::Invalid("parallelism must be at least 1".into()));
        }
        if let Some((name, _)) = self.per_provider_concurrency.iter().find(|(_, n)| **n == 0) {
            return Err(ConfigError::Invalid(format!(
                "concurrency limit for provider {name:?} must be at least 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse engine config: {0}")]
    Parse(String),
    #[error("invalid engine config: {0}")]
    Invalid(String),
}
