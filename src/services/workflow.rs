use crate::core::error::GenerationError;
use crate::core::story::{GenerationRequest, Scene, Story, StoryPage};
use crate::services::factory::StoryServices;
use crate::services::image::ImageClient;
use crate::services::llm::TextClient;
use crate::services::script::{compose_image_prompt, compose_story_prompt, parse_scenes};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Turns a `GenerationRequest` into a finished `Story`.
///
/// Each run is all-or-nothing: a failed text or image call aborts the run and
/// nothing generated so far is kept. Illustrations are requested one at a time
/// in scene order because later prompts refer back to earlier images.
pub struct StoryPipeline {
    text: Box<dyn TextClient>,
    image: Box<dyn ImageClient>,
    image_delay: Duration,
    show_progress: bool,
}

impl StoryPipeline {
    pub fn new(text: Box<dyn TextClient>, image: Box<dyn ImageClient>) -> Self {
        Self {
            text,
            image,
            image_delay: Duration::ZERO,
            show_progress: false,
        }
    }

    pub fn from_services(services: StoryServices) -> Self {
        Self::new(services.text, services.image)
    }

    /// Fixed pause between consecutive image requests.
    pub fn with_image_delay(mut self, delay: Duration) -> Self {
        self.image_delay = delay;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Story, GenerationError> {
        if request.desired_page_count == 0 {
            return Err(GenerationError::InvalidRequest(
                "desired page count must be greater than zero".to_string(),
            ));
        }

        let story_prompt = compose_story_prompt(request);
        log::info!(
            "Generating a {}-page story for {}",
            request.desired_page_count,
            request.child_name
        );

        let raw = self
            .text
            .generate_text(&story_prompt)
            .await
            .map_err(GenerationError::StoryText)?;
        log::debug!("Story text received ({} chars)", raw.len());

        let scenes = parse_scenes(&raw, request.desired_page_count);
        if scenes.len() < request.desired_page_count {
            log::warn!(
                "Generator returned {} of {} requested scenes",
                scenes.len(),
                request.desired_page_count
            );
        }

        let illustrations = self.illustrate(request, &scenes).await?;
        let pages = assemble_pages(&scenes, illustrations, &story_prompt);

        Ok(Story {
            pages,
            source_request: request.clone(),
            story_prompt,
        })
    }

    /// Returns `(image_prompt, image_reference)` per scene, in scene order.
    async fn illustrate(
        &self,
        request: &GenerationRequest,
        scenes: &[Scene],
    ) -> Result<Vec<(String, String)>, GenerationError> {
        let pb = if self.show_progress && !scenes.is_empty() {
            let pb = ProgressBar::new(scenes.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} illustrations")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut results = Vec::with_capacity(scenes.len());
        for scene in scenes {
            if scene.index > 0 && !self.image_delay.is_zero() {
                tokio::time::sleep(self.image_delay).await;
            }

            let prompt = compose_image_prompt(request, scene);
            log::debug!("Requesting illustration for scene {}", scene.index + 1);
            let reference = match self.image.generate_image(&prompt).await {
                Ok(reference) => reference,
                Err(source) => {
                    pb.abandon();
                    return Err(GenerationError::Image {
                        scene_index: scene.index,
                        source,
                    });
                }
            };
            results.push((prompt, reference));
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(results)
    }
}

/// Zips scenes with their illustrations, keeping prompts for display.
pub fn assemble_pages(
    scenes: &[Scene],
    illustrations: Vec<(String, String)>,
    story_prompt: &str,
) -> Vec<StoryPage> {
    scenes
        .iter()
        .zip(illustrations)
        .map(|(scene, (image_prompt, image_reference))| StoryPage {
            content: scene.content.clone(),
            image_reference,
            text_prompt: Some(story_prompt.to_string()),
            image_prompt: Some(image_prompt),
        })
        .collect()
}
