use crate::api::{ImageGenerator, NarrationGenerator, StoryGenerator};
use crate::error::{Result, VideoError};
use crate::scene::Story;
use crate::video::{purge_scene_images, VideoGenerator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a complete prompt-to-video run
#[derive(Debug, Clone)]
pub struct StoryVideo {
    pub story: Story,
    /// Scene images the video was built from. Empty unless the pipeline keeps
    /// its images, since they are purged once the run ends.
    pub images: Vec<PathBuf>,
    pub narration: PathBuf,
    pub video: PathBuf,
}

pub struct StoryPipeline {
    pub stories: Arc<dyn StoryGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub narrator: Arc<dyn NarrationGenerator>,
    pub video: VideoGenerator,
    pub image_dir: PathBuf,
    pub narration_file: String,
    /// Leave the scene images on disk after the run
    pub keep_images: bool,
}

impl StoryPipeline {
    /// Prompt in, video out. Scene images from earlier runs are purged first
    /// and, unless `keep_images` is set, this run's images are purged afterwards
    /// whether or not it succeeded.
    pub async fn run(&self, prompt: &str) -> Result<StoryVideo> {
        purge_scene_images(&self.image_dir)?;

        let mut result = self.generate(prompt).await;

        if !self.keep_images {
            if let Err(e) = purge_scene_images(&self.image_dir) {
                warn!("Failed to clean up scene images: {}", e);
            }
            if let Ok(video) = &mut result {
                video.images.clear();
            }
        }
        result
    }

    async fn generate(&self, prompt: &str) -> Result<StoryVideo> {
        info!("Step 1/4: Generating story...");
        let story = self.stories.generate_story(prompt).await?;
        story.validate()?;
        info!("Generated {} scenes for '{}'", story.scenes.len(), story.title);

        info!("Step 2/4: Generating images for each scene...");
        let scene_count = story.scenes.len();
        let mut images = Vec::with_capacity(scene_count);
        for (idx, scene) in story.scenes.iter().enumerate() {
            match self.images.generate_image(&scene.image_prompt, idx).await {
                Some(path) => {
                    info!("Generated image for scene {}/{}", idx + 1, scene_count);
                    images.push(path);
                }
                None => warn!("Skipping scene {}: no image", idx + 1),
            }
        }
        if images.is_empty() {
            return Err(VideoError::precondition(
                "image generation failed for all scenes",
            ));
        }

        info!("Step 3/4: Generating narration...");
        let narration = self
            .narrator
            .generate_narration(&story.narration_text(), &self.narration_file)
            .await?;

        info!("Step 4/4: Generating final video...");
        let video = self
            .video
            .generate_video(&narration, &images, &story.title)
            .await?;

        Ok(StoryVideo {
            story,
            images,
            narration,
            video,
        })
    }
}
