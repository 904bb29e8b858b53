use crate::error::{Result, VideoError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the silent slideshow is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlideshowMode {
    /// Concat demuxer fed by a manifest of (image, duration) entries
    #[default]
    Manifest,
    /// One looped input per image, optionally zoomed, joined with the concat filter
    PerImage,
}

/// What to do when the music library has no tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingMusicPolicy {
    #[default]
    Fail,
    NarrationOnly,
}

/// Zoom applied in per-image mode when none is configured
pub const DEFAULT_PER_IMAGE_ZOOM: f64 = 1.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub zoom_factor: Option<f64>,
    pub slideshow_mode: SlideshowMode,
    /// Linear gain applied to the looped music track only
    pub music_gain: f64,
    pub missing_music: MissingMusicPolicy,
    /// Upper bound for a single FFmpeg invocation; `None` waits forever
    pub stage_timeout_secs: Option<u64>,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution {
                width: 1024,
                height: 1024,
            },
            frame_rate: 25,
            zoom_factor: None,
            slideshow_mode: SlideshowMode::Manifest,
            music_gain: 0.2,
            missing_music: MissingMusicPolicy::Fail,
            stage_timeout_secs: Some(600),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl CompositionConfig {
    pub fn validate(&self) -> Result<()> {
        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(VideoError::precondition(format!(
                "resolution {} must be non-zero and even (required for yuv420p)",
                self.resolution
            )));
        }
        if self.frame_rate == 0 {
            return Err(VideoError::precondition("frame_rate must be non-zero"));
        }
        if !(self.music_gain > 0.0 && self.music_gain <= 1.0) {
            return Err(VideoError::precondition(format!(
                "music_gain must be in (0, 1], got {}",
                self.music_gain
            )));
        }
        if let Some(zoom) = self.zoom_factor {
            if !zoom.is_finite() || zoom < 1.0 {
                return Err(VideoError::precondition(format!(
                    "zoom_factor must be >= 1.0, got {zoom}"
                )));
            }
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(VideoError::precondition("stage_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }

    /// Zoom used by the per-image builder; `None` means a static hold
    pub fn effective_zoom(&self) -> Option<f64> {
        match self.slideshow_mode {
            SlideshowMode::Manifest => None,
            SlideshowMode::PerImage => Some(self.zoom_factor.unwrap_or(DEFAULT_PER_IMAGE_ZOOM))
                .filter(|z| *z > 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    pub music_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("output_images"),
            video_dir: PathBuf::from("output_videos"),
            music_dir: PathBuf::from("music"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathConfig,
    pub composition: CompositionConfig,
    pub voice_id: String,
    pub narration_file: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathConfig::default(),
            composition: CompositionConfig::default(),
            voice_id: "G17SuINrv2H9FC6nvetn".to_string(),
            narration_file: "narration.mp3".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by the TOML file when one is given
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.composition.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}
