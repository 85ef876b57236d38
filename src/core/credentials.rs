use crate::core::error::ConfigurationError;
use crate::core::io::Storage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Storage key of the single persisted credentials record.
pub const CREDENTIALS_KEY: &str = "credentials.json";

pub const PROVIDER_OPENAI: &str = "openai";
pub const PROVIDER_GEMINI: &str = "gemini";

/// The credentials record as entered on login and persisted to storage.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub provider: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability_api_key: Option<String>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field(
                "stability_api_key",
                &self.stability_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Provider selection with exactly the secrets that provider needs.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderCredentials {
    /// GPT for text, DALL-E for images.
    OpenAi { api_key: String },
    /// Gemini for text, Stability AI for images.
    GeminiStability {
        gemini_api_key: String,
        stability_api_key: String,
    },
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderCredentials::{}(<redacted>)", self.label())
    }
}

impl ProviderCredentials {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigurationError> {
        match config.provider.as_str() {
            PROVIDER_OPENAI => Ok(Self::OpenAi {
                api_key: required(&config.api_key, "OpenAI", "an OpenAI API key")?,
            }),
            PROVIDER_GEMINI => {
                let gemini_api_key =
                    required(&config.api_key, "Gemini", "a Google Gemini API key")?;
                let stability_api_key = required(
                    config.stability_api_key.as_deref().unwrap_or(""),
                    "Gemini",
                    "a Stability AI API key",
                )?;
                Ok(Self::GeminiStability {
                    gemini_api_key,
                    stability_api_key,
                })
            }
            other => Err(ConfigurationError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "OpenAI",
            Self::GeminiStability { .. } => "GeminiStability",
        }
    }
}

fn required(
    value: &str,
    provider: &'static str,
    credential: &'static str,
) -> Result<String, ConfigurationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigurationError::MissingCredential {
            provider,
            credential,
        });
    }
    Ok(value.to_string())
}

/// Loads, saves and clears the persisted credentials record.
pub struct CredentialStore {
    storage: Arc<dyn Storage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn load(&self) -> Result<Option<ApiConfig>> {
        if !self.storage.exists(CREDENTIALS_KEY).await? {
            return Ok(None);
        }
        let bytes = self.storage.read(CREDENTIALS_KEY).await?;
        let config: ApiConfig =
            serde_json::from_slice(&bytes).context("Failed to parse saved credentials")?;
        log::debug!("Loaded saved credentials for provider {}", config.provider);
        Ok(Some(config))
    }

    pub async fn save(&self, config: &ApiConfig) -> Result<()> {
        let content = serde_json::to_string(config)?;
        self.storage.write(CREDENTIALS_KEY, content.as_bytes()).await?;
        log::info!("Saved credentials for provider {}", config.provider);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.delete(CREDENTIALS_KEY).await?;
        log::info!("Cleared saved credentials");
        Ok(())
    }
}
