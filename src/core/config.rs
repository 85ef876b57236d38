use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    /// Root of the local storage holding the saved credentials record.
    #[serde(default = "default_storage")]
    pub storage_folder: String,

    /// Pause between consecutive image requests, for rate-limited providers.
    #[serde(default)]
    pub image_request_delay_ms: u64,

    #[serde(default = "default_true")]
    pub include_prompts_in_export: bool,

    #[serde(default)]
    pub provider: ProviderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            storage_folder: default_storage(),
            image_request_delay_ms: 0,
            include_prompts_in_export: true,
            provider: ProviderSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderSettings {
    /// Upper bound on a whole provider request, connect to last body byte.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub openai: OpenAISettings,
    #[serde(default)]
    pub gemini: GeminiSettings,
    #[serde(default)]
    pub stability: StabilitySettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            openai: OpenAISettings::default(),
            gemini: GeminiSettings::default(),
            stability: StabilitySettings::default(),
        }
    }
}

impl ProviderSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAISettings {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_text_model")]
    pub text_model: String,
    #[serde(default = "default_openai_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_image_quality")]
    pub image_quality: String,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            text_model: default_openai_text_model(),
            image_model: default_openai_image_model(),
            image_size: default_image_size(),
            image_quality: default_image_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiSettings {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StabilitySettings {
    #[serde(default = "default_stability_base_url")]
    pub base_url: String,
    #[serde(default = "default_stability_engine")]
    pub engine: String,
    #[serde(default = "default_stability_steps")]
    pub steps: u32,
    #[serde(default = "default_stability_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_stability_style_preset")]
    pub style_preset: String,
}

impl Default for StabilitySettings {
    fn default() -> Self {
        Self {
            base_url: default_stability_base_url(),
            engine: default_stability_engine(),
            steps: default_stability_steps(),
            cfg_scale: default_stability_cfg_scale(),
            style_preset: default_stability_style_preset(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_storage() -> String {
    ".storybook".to_string()
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    120
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_text_model() -> String {
    "gpt-4".to_string()
}
fn default_openai_image_model() -> String {
    "dall-e-3".to_string()
}
fn default_image_size() -> String {
    "1024x1024".to_string()
}
fn default_image_quality() -> String {
    "standard".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_stability_base_url() -> String {
    "https://api.stability.ai".to_string()
}
fn default_stability_engine() -> String {
    "stable-diffusion-xl-1024-v1-0".to_string()
}
fn default_stability_steps() -> u32 {
    30
}
fn default_stability_cfg_scale() -> f32 {
    7.0
}
fn default_stability_style_preset() -> String {
    "digital-art".to_string()
}

impl Config {
    /// Reads `config.yml`, or returns defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.storage_folder)?;
        Ok(())
    }
}
