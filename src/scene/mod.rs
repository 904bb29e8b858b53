use crate::error::{Result, VideoError};
use serde::{Deserialize, Serialize};

/// One narrative unit of the story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Narrated paragraph
    pub text: String,
    /// Prompt handed to the image generator
    pub image_prompt: String,
}

impl Scene {
    pub fn new(text: impl Into<String>, image_prompt: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_prompt: image_prompt.into(),
        }
    }
}

/// A titled story; scene order is both display and narration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Story {
    pub fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            return Err(VideoError::precondition(format!(
                "story '{}' has no scenes",
                self.title
            )));
        }
        Ok(())
    }

    /// Title followed by every scene text, as read by the narrator
    pub fn narration_text(&self) -> String {
        let body = self
            .scenes
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}. {}", self.title.trim(), body)
    }

    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Lower-cased, `_`-joined, filesystem-safe form of a title.
///
/// Runs of anything that is not an ASCII letter or digit collapse into a single
/// underscore, so `"The Last Stargazer!"` becomes `the_last_stargazer`.
///
/// A title with no ASCII letters or digits (`"!!!"`, `"Ночь"`, `"夜"`) falls back
/// to `video`, so such titles all map to the same `video.mp4` and a later run
/// replaces an earlier one.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("video");
    }
    slug
}
