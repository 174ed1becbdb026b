//! Provider configuration as read from config files.

use crate::error::ApiError;
use crate::provider::{CompletionOptions, ModelProvider};
use serde::{Deserialize, Serialize};

/// Default Azure OpenAI REST API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-01";

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[serde(alias = "OpenAI")]
    OpenAI,
    #[serde(alias = "Azure")]
    Azure,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Azure => "azure",
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,

    /// Model name (OpenAI) or deployment name (Azure)
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Custom base URL (OpenAI) or resource endpoint (Azure)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Azure REST API version
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            endpoint: None,
            api_version: None,
            default_options: CompletionOptions::default(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            reqwest::Url::parse(endpoint)
                .map_err(|e| format!("Invalid endpoint URL '{}': {}", endpoint, e))?;
        }
        if self.provider_type == ProviderType::Azure && self.endpoint.is_none() {
            return Err("Azure provider requires an endpoint".to_string());
        }
        if let Some(temperature) = self.default_options.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }
        Ok(())
    }

    /// Resolve to a concrete provider. Fails when the API key is missing.
    pub fn to_model_provider(&self) -> Result<ModelProvider, ApiError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::ProviderNotConfigured(format!(
                    "{} provider has no API key (set provider.api_key or QUIZFORGE__PROVIDER__API_KEY)",
                    self.provider_type.as_str()
                ))
            })?;

        match self.provider_type {
            ProviderType::OpenAI => Ok(ModelProvider::OpenAI {
                model: self.model.clone(),
                api_key,
                base_url: self.endpoint.clone(),
            }),
            ProviderType::Azure => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ApiError::ProviderNotConfigured("Azure provider requires an endpoint".to_string())
                })?;
                Ok(ModelProvider::Azure {
                    deployment: self.model.clone(),
                    api_key,
                    endpoint,
                    api_version: self
                        .api_version
                        .clone()
                        .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                })
            }
        }
    }
}
