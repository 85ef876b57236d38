use crate::core::config::{OpenAISettings, StabilitySettings};
use crate::core::error::ProviderError;
use crate::services::llm::{http_client, send_json, ApiKey, OPENAI};
use crate::utils::image::png_data_uri;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

pub(crate) const STABILITY: &str = "Stability AI";

#[async_trait]
pub trait ImageClient: Send + Sync + Debug {
    /// Generates one illustration and returns an opaque reference to it:
    /// either a fetchable URL or an inline `data:` URI.
    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError>;
}

// --- OpenAI (DALL-E) ---

#[derive(Debug)]
pub struct OpenAIImageClient {
    api_key: ApiKey,
    model: String,
    size: String,
    quality: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIImageClient {
    pub fn new(api_key: &str, settings: &OpenAISettings, timeout: Duration) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            model: settings.image_model.clone(),
            size: settings.image_size.clone(),
            quality: settings.image_quality.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct OpenAIImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
    n: u32,
}

#[derive(Deserialize)]
struct OpenAIImageResponse {
    #[serde(default)]
    data: Vec<OpenAIImageData>,
}

#[derive(Deserialize)]
struct OpenAIImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

fn openai_image_reference(result: OpenAIImageResponse) -> Result<String, ProviderError> {
    let first = result.data.into_iter().next();
    match first {
        Some(OpenAIImageData { url: Some(url), .. }) if !url.is_empty() => Ok(url),
        Some(OpenAIImageData {
            b64_json: Some(b64),
            ..
        }) if !b64.is_empty() => Ok(png_data_uri(&b64)),
        _ => Err(ProviderError::Empty {
            provider: OPENAI,
            what: "image",
        }),
    }
}

#[async_trait]
impl ImageClient for OpenAIImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/images/generations", self.base_url);

        let request_body = OpenAIImageRequest {
            model: &self.model,
            prompt,
            size: &self.size,
            quality: &self.quality,
            n: 1,
        };

        log::debug!("Requesting illustration from OpenAI model {}", self.model);
        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(&request_body);

        let result: OpenAIImageResponse = send_json(OPENAI, request).await?;
        openai_image_reference(result)
    }
}

// --- Stability AI ---

#[derive(Debug)]
pub struct StabilityImageClient {
    api_key: ApiKey,
    settings: StabilitySettings,
    client: reqwest::Client,
}

impl StabilityImageClient {
    pub fn new(api_key: &str, settings: &StabilitySettings, timeout: Duration) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            settings: settings.clone(),
            client: http_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct StabilityRequest<'a> {
    text_prompts: Vec<StabilityTextPrompt<'a>>,
    cfg_scale: f32,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
    style_preset: &'a str,
}

#[derive(Serialize)]
struct StabilityTextPrompt<'a> {
    text: &'a str,
    weight: f32,
}

#[derive(Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Vec<StabilityArtifact>,
}

#[derive(Deserialize)]
struct StabilityArtifact {
    base64: Option<String>,
}

fn stability_image_reference(result: StabilityResponse) -> Result<String, ProviderError> {
    result
        .artifacts
        .into_iter()
        .next()
        .and_then(|a| a.base64)
        .filter(|b64| !b64.is_empty())
        .map(|b64| png_data_uri(&b64))
        .ok_or(ProviderError::Empty {
            provider: STABILITY,
            what: "image",
        })
}

#[async_trait]
impl ImageClient for StabilityImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1/generation/{}/text-to-image",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.engine
        );

        let request_body = StabilityRequest {
            text_prompts: vec![StabilityTextPrompt {
                text: prompt,
                weight: 1.0,
            }],
            cfg_scale: self.settings.cfg_scale,
            height: 1024,
            width: 1024,
            samples: 1,
            steps: self.settings.steps,
            style_preset: &self.settings.style_preset,
        };

        log::debug!("Requesting illustration from Stability engine {}", self.settings.engine);
        let request = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(&request_body);

        let result: StabilityResponse = send_json(STABILITY, request).await?;
        stability_image_reference(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_image_url() {
        let json = r#"{
            "created": 1589478378,
            "data": [{ "url": "https://images.example.com/1.png", "revised_prompt": "..." }]
        }"#;
        let result: OpenAIImageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            openai_image_reference(result).unwrap(),
            "https://images.example.com/1.png"
        );
    }

    #[test]
    fn test_openai_image_inline_payload() {
        let json = r#"{ "data": [{ "b64_json": "QUJD" }] }"#;
        let result: OpenAIImageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            openai_image_reference(result).unwrap(),
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn test_openai_no_images_is_error() {
        let result: OpenAIImageResponse = serde_json::from_str(r#"{ "data": [] }"#).unwrap();
        assert!(matches!(
            openai_image_reference(result),
            Err(ProviderError::Empty { what: "image", .. })
        ));
    }

    #[test]
    fn test_stability_artifact() {
        let json = r#"{
            "artifacts": [{ "base64": "iVBORw0KGgo=", "seed": 1, "finishReason": "SUCCESS" }]
        }"#;
        let result: StabilityResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            stability_image_reference(result).unwrap(),
            "data:image/png;base64,iVBORw0KGgo="
        );
    }

    #[test]
    fn test_stability_zero_artifacts_is_error() {
        let result: StabilityResponse = serde_json::from_str(r#"{ "artifacts": [] }"#).unwrap();
        let err = stability_image_reference(result).unwrap_err();
        assert_eq!(err.to_string(), "Stability AI returned no image");
    }

    #[test]
    fn test_stability_request_shape() {
        let settings = StabilitySettings::default();
        let body = StabilityRequest {
            text_prompts: vec![StabilityTextPrompt {
                text: "a dragon",
                weight: 1.0,
            }],
            cfg_scale: settings.cfg_scale,
            height: 1024,
            width: 1024,
            samples: 1,
            steps: settings.steps,
            style_preset: &settings.style_preset,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["text_prompts"][0]["text"], "a dragon");
        assert_eq!(value["steps"], 30);
        assert_eq!(value["style_preset"], "digital-art");
    }
}
