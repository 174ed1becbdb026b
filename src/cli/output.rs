//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ProviderNotConfigured(msg) => format!(
            "Provider not configured: {}\nSet provider.api_key in config/config.toml or QUIZFORGE__PROVIDER__API_KEY.",
            msg
        ),
        ApiError::ConfigError(msg) => format!("Configuration error: {}", msg),
        other => other.to_string(),
    }
}
