use thiserror::Error;

/// Problems with the selected provider or its credentials. Raised before any
/// network traffic happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("{provider} requires {credential}, but none was provided")]
    MissingCredential {
        provider: &'static str,
        credential: &'static str,
    },
    #[error("Unsupported AI provider: {0}")]
    UnsupportedProvider(String),
}

/// A failed remote call to a text or image provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error (HTTP {status}): {body}")]
    Http {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} API returned error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },
    #[error("Failed to parse {provider} response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned no {what}")]
    Empty {
        provider: &'static str,
        what: &'static str,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Decode { provider, .. }
            | ProviderError::Empty { provider, .. } => provider,
        }
    }
}

/// Pipeline-level failure, annotated with the step that failed.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Story text generation failed: {0}")]
    StoryText(#[source] ProviderError),
    #[error("Image generation failed for scene {} of the story: {source}", .scene_index + 1)]
    Image {
        scene_index: usize,
        #[source]
        source: ProviderError,
    },
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_error_reports_one_based_scene() {
        let err = GenerationError::Image {
            scene_index: 1,
            source: ProviderError::Empty {
                provider: "Stability AI",
                what: "image",
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("scene 2"), "{}", msg);
        assert!(msg.contains("Stability AI returned no image"), "{}", msg);
    }

    #[test]
    fn test_provider_name_is_kept() {
        let err = ProviderError::Http {
            provider: "OpenAI",
            status: 401,
            body: "bad key".to_string(),
        };
        assert_eq!(err.provider(), "OpenAI");
        assert_eq!(err.to_string(), "OpenAI API error (HTTP 401): bad key");
    }
}
