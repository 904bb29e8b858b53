//! Hosted AI collaborators: story text, scene images and narration.

mod elevenlabs;
mod gemini;

pub use elevenlabs::ElevenLabsClient;
pub use gemini::GeminiClient;

use crate::error::{Result, VideoError};
use crate::scene::Story;
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Titled story split into scenes; malformed model output is a [`VideoError::Generation`].
    async fn generate_story(&self, prompt: &str) -> Result<Story>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Image for the scene at 0-based `index`, or `None` when this scene failed.
    async fn generate_image(&self, prompt: &str, index: usize) -> Option<PathBuf>;
}

#[async_trait]
pub trait NarrationGenerator: Send + Sync {
    async fn generate_narration(&self, text: &str, filename: &str) -> Result<PathBuf>;
}

pub(crate) const STORY_INSTRUCTIONS: &str = r#"You are a creative content generator. Based on the user's prompt, generate a JSON object with a 'title' and a list of 5 'scenes'.
Each scene object must contain two keys:
1. 'text': A paragraph of the story (about 30-50 words).
2. 'image_prompt': A descriptive, visually rich prompt for image generation. Focus on art style (e.g., cinematic, digital art, photorealistic), lighting, and mood.

Return only valid JSON format."#;

/// Parse the model's JSON answer, tolerating a surrounding markdown fence.
pub fn parse_story(raw: &str) -> Result<Story> {
    let json_text = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let story: Story = serde_json::from_str(json_text)
        .map_err(|e| VideoError::Generation(format!("Failed to parse story JSON: {}", e)))?;
    story.validate()?;
    Ok(story)
}

/// Flatten whitespace and drop characters that trip up speech synthesis.
pub fn clean_story(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static UNSPEAKABLE: OnceLock<Regex> = OnceLock::new();

    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));
    let unspeakable =
        UNSPEAKABLE.get_or_init(|| Regex::new(r"[^\w\s.,!?;:'-]").expect("valid regex"));

    let collapsed = spaces.replace_all(text.trim(), " ");
    unspeakable.replace_all(&collapsed, "").into_owned()
}
