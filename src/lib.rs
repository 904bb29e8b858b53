//! Prompt-to-video: an AI-written story, one generated image per scene, a
//! synthesized narration, and an FFmpeg slideshow with background music.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scene;
pub mod video;

pub use config::{AppConfig, CompositionConfig, MissingMusicPolicy, SlideshowMode};
pub use error::{Result, VideoError};
pub use pipeline::{StoryPipeline, StoryVideo};
pub use scene::{slugify, Scene, Story};
pub use video::{CompositionContext, VideoGenerator};
