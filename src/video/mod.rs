pub mod compositor;
pub mod ffmpeg;
pub mod generator;
pub mod janitor;
pub mod mixer;
pub mod slideshow;
pub mod timing;

pub use ffmpeg::{Ffmpeg, FfmpegJob, MediaTool, Stage};
pub use generator::{CompositionContext, VideoGenerator};
pub use janitor::{collect_scene_images, purge_scene_images, scene_image_name};
pub use mixer::{FixedSelector, MusicSelector, RandomSelector, SeededSelector};
pub use timing::{duration_per_image, SlideTiming};

/// Output codecs are fixed; only geometry and timing are configurable.
pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";
pub const PIXEL_FORMAT: &str = "yuv420p";
