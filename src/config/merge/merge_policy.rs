//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Only required fields need a default here; everything else falls back to
/// its serde default when no source sets it.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("provider.provider_type", "openai")?
        .set_default("provider.model", "gpt-3.5-turbo")?
        .set_default("generation.max_tries", 10)?
        .set_default("generation.workers", 2)?
        .set_default("storage.store_path", ".quizforge/store")
}
