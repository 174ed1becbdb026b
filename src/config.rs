//! Configuration System
//!
//! Layered configuration: built-in defaults, the user's global config file,
//! workspace config files and `QUIZFORGE__SECTION__KEY` environment variables,
//! merged with the `config` crate. Validation collects every problem instead of
//! stopping at the first.

use crate::generation::GenerationSettings;
use crate::logging::LoggingConfig;
use crate::prompt::{default_presets, Preset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::provider::{ProviderConfig, ProviderType};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizforgeConfig {
    /// LLM provider used for generation
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Retry loop and queue settings
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Prompt presets, selectable per submission by index (1-based) or name
    #[serde(default = "default_presets")]
    pub presets: Vec<Preset>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for QuizforgeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            generation: GenerationSettings::default(),
            presets: default_presets(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Storage paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory, relative to the workspace unless absolute
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".quizforge/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

impl StorageConfig {
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.store_path.is_absolute() {
            self.store_path.clone()
        } else {
            workspace_root.join(&self.store_path)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Generation(String),
    Preset(usize, String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Generation(msg) => write!(f, "Generation: {}", msg),
            ValidationError::Preset(index, msg) => write!(f, "Preset {}: {}", index + 1, msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl QuizforgeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.provider.validate() {
            errors.push(ValidationError::Provider(e));
        }

        if self.generation.max_tries == 0 {
            errors.push(ValidationError::Generation(
                "max_tries must be greater than zero".to_string(),
            ));
        }
        if self.generation.workers == 0 {
            errors.push(ValidationError::Generation(
                "workers must be greater than zero".to_string(),
            ));
        }
        if self.generation.default_question_count == 0 {
            errors.push(ValidationError::Generation(
                "default_question_count must be greater than zero".to_string(),
            ));
        }

        for (index, preset) in self.presets.iter().enumerate() {
            if let Err(e) = preset.validate() {
                errors.push(ValidationError::Preset(index, e));
            }
        }

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "store_path cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
