use crate::core::config::{GeminiSettings, OpenAISettings};
use crate::core::error::ProviderError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

pub(crate) const OPENAI: &str = "OpenAI";
pub(crate) const GEMINI: &str = "Gemini";

/// An API key that never shows up in `Debug` output.
#[derive(Clone)]
pub(crate) struct ApiKey(String);

impl ApiKey {
    pub(crate) fn new(key: &str) -> Self {
        Self(key.to_string())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[async_trait]
pub trait TextClient: Send + Sync + Debug {
    /// Sends one fully formed prompt and returns the raw generated text.
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// HTTP client whose requests give up after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            log::error!("Failed to build HTTP client: {}. Using default client.", e);
            reqwest::Client::new()
        })
}

/// Sends a prepared request and decodes a JSON body, mapping every failure
/// onto a `ProviderError` for `provider`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let resp = request
        .send()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|source| ProviderError::Transport { provider, source })?;

    if !status.is_success() {
        return Err(ProviderError::Http {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
        provider,
        message: format!("{}. Body: {}", e, body),
    })
}

// --- OpenAI ---

#[derive(Debug)]
pub struct OpenAITextClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAITextClient {
    pub fn new(api_key: &str, settings: &OpenAISettings, timeout: Duration) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            model: settings.text_model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

fn openai_text(result: OpenAIResponse) -> Result<String, ProviderError> {
    match result.choices.into_iter().next() {
        Some(choice) => Ok(choice.message.content.unwrap_or_default()),
        None => Err(ProviderError::Empty {
            provider: OPENAI,
            what: "completion choices",
        }),
    }
}

#[async_trait]
impl TextClient for OpenAITextClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        log::debug!("Requesting story text from OpenAI model {}", self.model);
        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(&request_body);

        let result: OpenAIResponse = send_json(OPENAI, request).await?;
        openai_text(result)
    }
}

// --- Gemini ---

#[derive(Debug)]
pub struct GeminiTextClient {
    api_key: ApiKey,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiTextClient {
    pub fn new(api_key: &str, settings: &GeminiSettings, timeout: Duration) -> Self {
        Self {
            api_key: ApiKey::new(api_key),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn gemini_text(result: GeminiResponse) -> Result<String, ProviderError> {
    if let Some(err) = result.error {
        return Err(ProviderError::Api {
            provider: GEMINI,
            message: err.message,
        });
    }

    let first = result
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(ProviderError::Empty {
            provider: GEMINI,
            what: "candidates",
        })?;

    let reason = first.finish_reason.as_deref().unwrap_or("STOP");
    match first.content {
        Some(content) => Ok(content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")),
        // A normal stop with nothing to say is still a successful call
        None if reason == "STOP" => Ok(String::new()),
        None => Err(ProviderError::Api {
            provider: GEMINI,
            message: format!("response blocked. Finish reason: {}", reason),
        }),
    }
}

#[async_trait]
impl TextClient for GeminiTextClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        log::debug!("Requesting story text from Gemini model {}", self.model);
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&request_body);

        let result: GeminiResponse = send_json(GEMINI, request).await?;
        gemini_text(result)
    }
}
