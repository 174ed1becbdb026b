//! Config loading entry points.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::QuizforgeConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `QuizforgeConfig` from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load with file discovery.
    ///
    /// Precedence (lowest to highest): defaults, global config file, workspace
    /// `config/config.toml`, workspace `config/{QUIZFORGE_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<QuizforgeConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: QuizforgeConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load from one explicit file instead of discovery. Environment still applies.
    pub fn load_from_file(path: &Path) -> Result<QuizforgeConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }

    /// Where the global config file is looked up.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
