use super::ffmpeg::{FfmpegJob, MediaTool, Stage};
use super::timing::format_secs;
use super::{AUDIO_CODEC, PIXEL_FORMAT, VIDEO_CODEC};
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// Final container. `-shortest` cuts at the end of whichever stream runs out
/// first, absorbing the frame of drift between the two encodes; `-t` caps the
/// result at the narration length in case the muxer overshoots.
pub fn mux_job(video: &Path, audio: &Path, total_secs: f64, output: &Path) -> FfmpegJob {
    FfmpegJob::new(Stage::Mux, output)
        .input(video)
        .input(audio)
        .arg("-t")
        .arg(format_secs(total_secs))
        .args([
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            VIDEO_CODEC,
            "-pix_fmt",
            PIXEL_FORMAT,
            "-c:a",
            AUDIO_CODEC,
            "-shortest",
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ])
}

/// Mux into `scratch`, then move it to `output` once FFmpeg has succeeded.
pub async fn compose(
    tool: &dyn MediaTool,
    video: &Path,
    audio: &Path,
    total_secs: f64,
    scratch: &Path,
    output: &Path,
) -> Result<()> {
    info!("Adding audio to video...");
    tool.run(&mux_job(video, audio, total_secs, scratch)).await?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(scratch, output).await?;
    info!("Added audio to video: {}", output.display());
    Ok(())
}
