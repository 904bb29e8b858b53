use super::{parse_story, ImageGenerator, StoryGenerator, STORY_INSTRUCTIONS};
use crate::error::{Result, VideoError};
use crate::scene::Story;
use crate::video::scene_image_name;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const STORY_MODEL: &str = "gemini-2.0-flash";
const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    client: Client,
    image_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    data: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }
}

impl GeminiClient {
    pub fn new(api_key: String, image_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            api_key,
            client,
            image_dir: image_dir.into(),
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API, model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(VideoError::Api(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    async fn try_generate_image(&self, prompt: &str, image_path: &Path) -> Result<bool> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
        });
        let response = self.generate_content(IMAGE_MODEL, body).await?;

        let Some(inline) = response.parts().find_map(|p| p.inline_data.as_ref()) else {
            return Ok(false);
        };
        let bytes = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|e| VideoError::Generation(format!("Invalid image payload: {}", e)))?;

        tokio::fs::create_dir_all(&self.image_dir).await?;
        tokio::fs::write(image_path, bytes).await?;
        Ok(true)
    }
}

#[async_trait]
impl StoryGenerator for GeminiClient {
    async fn generate_story(&self, prompt: &str) -> Result<Story> {
        info!("Generating story and image prompts...");

        let body = json!({
            "contents": [{
                "parts": [{ "text": format!("{}\n\nUser prompt: {}", STORY_INSTRUCTIONS, prompt) }]
            }],
            "generationConfig": { "responseMimeType": "application/json" }
        });
        let response = self.generate_content(STORY_MODEL, body).await?;

        let text: String = response.parts().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            return Err(VideoError::Generation(
                "Gemini returned no story text".to_string(),
            ));
        }

        let story = parse_story(&text)?;
        info!("Story generated: '{}' with {} scenes", story.title, story.scenes.len());
        Ok(story)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, prompt: &str, index: usize) -> Option<PathBuf> {
        info!("Generating image for scene {}...", index + 1);
        let image_path = self.image_dir.join(scene_image_name(index + 1));

        match self.try_generate_image(prompt, &image_path).await {
            Ok(true) => {
                info!("Image saved to: {}", image_path.display());
                Some(image_path)
            }
            Ok(false) => {
                warn!("No image data returned for scene {}", index + 1);
                None
            }
            Err(e) => {
                warn!("Error generating image for scene {}: {}", index + 1, e);
                None
            }
        }
    }
}
