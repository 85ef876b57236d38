use crate::core::credentials::{ApiConfig, CredentialStore, PROVIDER_GEMINI, PROVIDER_OPENAI};
use crate::core::story::{
    parse_interests, GenerationRequest, StoryLength, MAX_AGE, MAX_PAGES, MIN_AGE, MIN_PAGES,
};
use anyhow::{anyhow, Result};
use inquire::{Confirm, CustomType, Password, Select, Text};

const OPENAI_LABEL: &str = "OpenAI (GPT-4 + DALL-E)";
const GEMINI_LABEL: &str = "Google Gemini + Stability AI";

/// Returns the saved credentials if the user wants to reuse them, otherwise
/// prompts for new ones and saves them.
pub async fn run_login(store: &CredentialStore) -> Result<ApiConfig> {
    if let Some(saved) = store.load().await? {
        let reuse = Confirm::new(&format!(
            "Use saved credentials for provider '{}'?",
            saved.provider
        ))
        .with_default(true)
        .prompt()?;
        if reuse {
            return Ok(saved);
        }
    }

    let config = prompt_credentials()?;
    store.save(&config).await?;
    println!("Credentials saved.");
    Ok(config)
}

fn prompt_credentials() -> Result<ApiConfig> {
    let choice = Select::new("AI Provider:", vec![OPENAI_LABEL, GEMINI_LABEL])
        .with_help_message("Gemini uses Stability AI for images; OpenAI handles both")
        .prompt()?;

    let provider = if choice == GEMINI_LABEL {
        PROVIDER_GEMINI
    } else {
        PROVIDER_OPENAI
    };

    let key_label = if provider == PROVIDER_GEMINI {
        "Google Gemini API Key:"
    } else {
        "OpenAI API Key:"
    };
    let api_key = prompt_secret(key_label)?;

    let stability_api_key = if provider == PROVIDER_GEMINI {
        Some(prompt_secret("Stability AI API Key (required for images):")?)
    } else {
        None
    };

    Ok(ApiConfig {
        provider: provider.to_string(),
        api_key,
        stability_api_key,
    })
}

fn prompt_secret(label: &str) -> Result<String> {
    let value = Password::new(label).without_confirmation().prompt()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} cannot be empty", label.trim_end_matches(':')));
    }
    Ok(value)
}

/// Collects and validates a story request.
pub fn run_story_form() -> Result<GenerationRequest> {
    let child_name = Text::new("Child's Name:").prompt()?;

    let age = CustomType::<u8>::new(&format!("Age ({}-{}):", MIN_AGE, MAX_AGE))
        .with_default(5)
        .with_error_message("Please enter a number")
        .prompt()?;

    let interests = Text::new("Interests (comma-separated):")
        .with_placeholder("e.g., dinosaurs, space, princesses")
        .prompt()?;

    let theme = Text::new("Story Theme:").prompt()?;

    let desired_page_count = CustomType::<usize>::new(&format!(
        "Number of Pages ({}-{}):",
        MIN_PAGES, MAX_PAGES
    ))
    .with_default(5)
    .with_error_message("Please enter a number")
    .prompt()?;

    let length = Select::new("Story Length:", StoryLength::ALL.to_vec())
        .with_starting_cursor(1)
        .prompt()?;

    let request = GenerationRequest {
        child_name: child_name.trim().to_string(),
        age,
        interests: parse_interests(&interests),
        theme: theme.trim().to_string(),
        desired_page_count,
        length,
    };
    request.validate()?;
    Ok(request)
}
