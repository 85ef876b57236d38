use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_AGE: u8 = 2;
pub const MAX_AGE: u8 = 12;
pub const MIN_PAGES: usize = 3;
pub const MAX_PAGES: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    pub const ALL: [StoryLength; 3] = [StoryLength::Short, StoryLength::Medium, StoryLength::Long];

    pub fn words_per_page(self) -> u32 {
        match self {
            StoryLength::Short => 30,
            StoryLength::Medium => 50,
            StoryLength::Long => 80,
        }
    }
}

impl fmt::Display for StoryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StoryLength::Short => "Short",
            StoryLength::Medium => "Medium",
            StoryLength::Long => "Long",
        };
        write!(f, "{} (~{} words per page)", label, self.words_per_page())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub child_name: String,
    pub age: u8,
    pub interests: Vec<String>,
    pub theme: String,
    pub desired_page_count: usize,
    #[serde(default)]
    pub length: StoryLength,
}

impl GenerationRequest {
    pub fn target_words_per_page(&self) -> u32 {
        self.length.words_per_page()
    }

    /// Form-level checks. The pipeline itself only insists on a non-zero page count.
    pub fn validate(&self) -> Result<()> {
        if self.child_name.trim().is_empty() {
            bail!("Child's name is required");
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            bail!("Age must be between {} and {}", MIN_AGE, MAX_AGE);
        }
        if self.interests.iter().all(|i| i.trim().is_empty()) {
            bail!("At least one interest is required");
        }
        if self.theme.trim().is_empty() {
            bail!("Story theme is required");
        }
        if !(MIN_PAGES..=MAX_PAGES).contains(&self.desired_page_count) {
            bail!("Number of pages must be between {} and {}", MIN_PAGES, MAX_PAGES);
        }
        Ok(())
    }
}

/// Splits a comma-separated interests field, dropping blank entries.
pub fn parse_interests(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(|i| i.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub index: usize,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoryPage {
    pub content: String,
    pub image_reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Story {
    pub pages: Vec<StoryPage>,
    pub source_request: GenerationRequest,
    pub story_prompt: String,
}

impl Story {
    pub fn title(&self) -> String {
        format!("A Story for {}", self.source_request.child_name)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
