use crate::core::config::ProviderSettings;
use crate::core::credentials::{ApiConfig, ProviderCredentials};
use crate::core::error::ConfigurationError;
use crate::services::image::{ImageClient, OpenAIImageClient, StabilityImageClient};
use crate::services::llm::{GeminiTextClient, OpenAITextClient, TextClient};

/// The text and image capabilities of one configured provider setup.
#[derive(Debug)]
pub struct StoryServices {
    pub text: Box<dyn TextClient>,
    pub image: Box<dyn ImageClient>,
}

/// Builds the client pair for `config`. Only constructs objects: credentials
/// are first exercised by the initial remote call.
pub fn create_service(
    config: &ApiConfig,
    settings: &ProviderSettings,
) -> Result<StoryServices, ConfigurationError> {
    let credentials = ProviderCredentials::from_config(config)?;
    log::info!("Creating {} clients", credentials.label());
    Ok(create_from_credentials(&credentials, settings))
}

pub fn create_from_credentials(
    credentials: &ProviderCredentials,
    settings: &ProviderSettings,
) -> StoryServices {
    let timeout = settings.request_timeout();
    match credentials {
        ProviderCredentials::OpenAi { api_key } => StoryServices {
            text: Box::new(OpenAITextClient::new(api_key, &settings.openai, timeout)),
            image: Box::new(OpenAIImageClient::new(api_key, &settings.openai, timeout)),
        },
        ProviderCredentials::GeminiStability {
            gemini_api_key,
            stability_api_key,
        } => StoryServices {
            text: Box::new(GeminiTextClient::new(gemini_api_key, &settings.gemini, timeout)),
            image: Box::new(StabilityImageClient::new(
                stability_api_key,
                &settings.stability,
                timeout,
            )),
        },
    }
}
