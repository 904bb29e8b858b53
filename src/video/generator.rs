use super::compositor::compose;
use super::ffmpeg::{Ffmpeg, MediaTool};
use super::janitor::{Artifact, RunWorkspace};
use super::mixer::{mix_audio, music_library, MusicSelector, RandomSelector};
use super::slideshow::build_slideshow;
use super::timing::SlideTiming;
use crate::config::{CompositionConfig, MissingMusicPolicy};
use crate::error::{Result, VideoError};
use crate::scene::slugify;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a composition run depends on, built once and handed to every stage.
#[derive(Clone)]
pub struct CompositionContext {
    pub config: CompositionConfig,
    pub tool: Arc<dyn MediaTool>,
    pub selector: Arc<dyn MusicSelector>,
}

impl CompositionContext {
    pub fn new(
        config: CompositionConfig,
        tool: Arc<dyn MediaTool>,
        selector: Arc<dyn MusicSelector>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tool,
            selector,
        })
    }

    /// Host FFmpeg and random music choice.
    pub fn from_config(config: CompositionConfig) -> Result<Self> {
        let tool = Arc::new(Ffmpeg::from_config(&config));
        Self::new(config, tool, Arc::new(RandomSelector))
    }
}

pub struct VideoGenerator {
    output_dir: PathBuf,
    music_dir: PathBuf,
    ctx: CompositionContext,
}

impl VideoGenerator {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        music_dir: impl Into<PathBuf>,
        ctx: CompositionContext,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            music_dir: music_dir.into(),
            ctx,
        }
    }

    /// Where the video for `title` ends up.
    pub fn output_path_for(&self, title: &str) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", slugify(title)))
    }

    /// Compose the final video from ordered images and the narration.
    ///
    /// Intermediates live in a scratch directory that is removed on every exit
    /// path. The final file only appears once the mux has succeeded.
    pub async fn generate_video(
        &self,
        narration: &Path,
        images: &[PathBuf],
        title: &str,
    ) -> Result<PathBuf> {
        info!("Starting video generation...");
        let config = &self.ctx.config;

        if images.is_empty() {
            return Err(VideoError::precondition("no images found to create a video"));
        }
        let music = self.pick_music()?;

        let total_secs = self.ctx.tool.probe_duration(narration).await?;
        let timing = SlideTiming::plan(total_secs, images.len(), config.frame_rate)?;
        info!(
            "Narration is {:.2}s; showing {} images for {:.2}s each",
            total_secs,
            images.len(),
            timing.per_image_secs
        );

        let mut workspace = RunWorkspace::create_in(&self.output_dir)?;
        let tool = self.ctx.tool.as_ref();

        let video = build_slideshow(tool, images, &timing, config, &mut workspace).await?;

        let audio = match &music {
            Some(track) => {
                mix_audio(
                    tool,
                    narration,
                    track,
                    total_secs,
                    config.music_gain,
                    &mut workspace,
                )
                .await?
            }
            None => narration.to_path_buf(),
        };

        let output = self.output_path_for(title);
        let scratch = workspace.artifact(Artifact::PartialOutput);
        compose(tool, &video, &audio, total_secs, &scratch, &output).await?;

        workspace.close()?;
        info!("Video generation completed: {}", output.display());
        Ok(output)
    }

    /// Background track for this run, or `None` when narration plays alone.
    fn pick_music(&self) -> Result<Option<PathBuf>> {
        let library = music_library(&self.music_dir)?;
        if library.is_empty() {
            return match self.ctx.config.missing_music {
                MissingMusicPolicy::Fail => Err(VideoError::precondition(format!(
                    "no background music (*.mp3) found in {}",
                    self.music_dir.display()
                ))),
                MissingMusicPolicy::NarrationOnly => {
                    warn!(
                        "No background music found in {}. Using narration only.",
                        self.music_dir.display()
                    );
                    Ok(None)
                }
            };
        }

        let track = self.ctx.selector.select(&library).ok_or_else(|| {
            VideoError::precondition(format!(
                "music selector chose none of the {} tracks in {}",
                library.len(),
                self.music_dir.display()
            ))
        })?;
        info!("Selected background music: {}", track.display());
        Ok(Some(track.to_path_buf()))
    }
}
