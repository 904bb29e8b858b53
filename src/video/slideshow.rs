use super::ffmpeg::{FfmpegJob, MediaTool, Stage};
use super::janitor::{Artifact, RunWorkspace};
use super::timing::{format_secs, SlideTiming};
use super::{PIXEL_FORMAT, VIDEO_CODEC};
use crate::config::{CompositionConfig, Resolution, SlideshowMode};
use crate::error::{Result, VideoError};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Encode the images into a silent video held for `timing`, returning its path.
pub async fn build_slideshow(
    tool: &dyn MediaTool,
    images: &[PathBuf],
    timing: &SlideTiming,
    config: &CompositionConfig,
    workspace: &mut RunWorkspace,
) -> Result<PathBuf> {
    if images.len() != timing.image_count() {
        return Err(VideoError::precondition(format!(
            "timing planned for {} images but {} were given",
            timing.image_count(),
            images.len()
        )));
    }

    let output = workspace.artifact(Artifact::Slideshow);
    let job = match config.slideshow_mode {
        SlideshowMode::Manifest => {
            let manifest_path = workspace.artifact(Artifact::Manifest);
            let manifest = render_manifest(images, timing)?;
            tokio::fs::write(&manifest_path, manifest).await?;
            manifest_job(&manifest_path, &output, timing, config)
        }
        SlideshowMode::PerImage => {
            per_image_job(images, timing, &output, config, config.effective_zoom())
        }
    };

    info!(
        "Creating slideshow from {} images ({:.2}s each, {:?} mode)...",
        images.len(),
        timing.per_image_secs,
        config.slideshow_mode
    );
    tool.run(&job).await?;
    info!("Created slideshow: {}", output.display());
    Ok(output)
}

/// Concat-demuxer script listing each image with its on-screen time.
///
/// The demuxer ignores the duration of the final entry, so the last image is
/// listed once more without one; otherwise it would be cut short.
pub fn render_manifest(images: &[PathBuf], timing: &SlideTiming) -> Result<String> {
    let Some(last) = images.last() else {
        return Err(VideoError::precondition("no images found to create a video"));
    };

    let mut manifest = String::new();
    for (i, image) in images.iter().enumerate() {
        let _ = writeln!(manifest, "file '{}'", quote_manifest_path(&absolute(image)?));
        let _ = writeln!(manifest, "duration {}", format_secs(timing.slide_secs(i)));
    }
    let _ = writeln!(manifest, "file '{}'", quote_manifest_path(&absolute(last)?));
    Ok(manifest)
}

/// Output frame rate comes from `timing`, the rate the slide durations were planned at.
pub fn manifest_job(
    manifest: &Path,
    output: &Path,
    timing: &SlideTiming,
    config: &CompositionConfig,
) -> FfmpegJob {
    let filter = format!(
        "{},fps={},format={}",
        fit_frame(config.resolution),
        timing.frame_rate,
        PIXEL_FORMAT
    );
    FfmpegJob::new(Stage::Slideshow, output)
        .args(["-f", "concat", "-safe", "0"])
        .input(manifest)
        .arg("-vf")
        .arg(filter)
        .args(["-c:v", VIDEO_CODEC, "-pix_fmt", PIXEL_FORMAT, "-an"])
}

/// One input per image, each expanded to its frame count, then concatenated.
/// Frame counts and output rate both come from `timing`.
pub fn per_image_job(
    images: &[PathBuf],
    timing: &SlideTiming,
    output: &Path,
    config: &CompositionConfig,
    zoom: Option<f64>,
) -> FfmpegJob {
    let fps = timing.frame_rate;
    let res = config.resolution;
    let mut job = FfmpegJob::new(Stage::Slideshow, output);
    let mut graph = String::new();

    for (i, image) in images.iter().enumerate() {
        let frames = timing.frames[i];
        match zoom {
            Some(zoom) => {
                // zoompan turns the single decoded frame into `frames` output frames.
                job = job.input(image);
                let step = (zoom - 1.0) / frames as f64;
                let _ = write!(
                    graph,
                    "[{i}:v]{cover},zoompan=z='min(zoom+{step:.6},{zoom})':\
                     x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d={frames}:s={res}:fps={fps},\
                     setsar=1[v{i}];",
                    cover = cover_frame(res),
                );
            }
            None => {
                job = job
                    .args(["-loop", "1", "-framerate"])
                    .arg(fps.to_string())
                    .input(image);
                let _ = write!(
                    graph,
                    "[{i}:v]{cover},setsar=1,trim=end_frame={frames},setpts=PTS-STARTPTS[v{i}];",
                    cover = cover_frame(res),
                );
            }
        }
    }

    for i in 0..images.len() {
        let _ = write!(graph, "[v{i}]");
    }
    let _ = write!(
        graph,
        "concat=n={}:v=1:a=0,fps={fps},format={PIXEL_FORMAT}[v]",
        images.len()
    );

    job.arg("-filter_complex")
        .arg(graph)
        .args(["-map", "[v]", "-c:v", VIDEO_CODEC, "-pix_fmt", PIXEL_FORMAT, "-an"])
}

/// Letterbox into the frame, keeping aspect ratio.
fn fit_frame(res: Resolution) -> String {
    let Resolution { width, height } = res;
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1"
    )
}

/// Fill the frame, cropping the overflow.
fn cover_frame(res: Resolution) -> String {
    let Resolution { width, height } = res;
    format!("scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}")
}

fn absolute(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        VideoError::precondition(format!(
            "image '{}' is not readable: {}",
            path.display(),
            e
        ))
    })
}

fn quote_manifest_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn images(dir: &Path, n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| {
                let p = dir.join(format!("scene_{i}.png"));
                std::fs::write(&p, b"png").unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn manifest_repeats_last_image_without_duration() {
        let dir = TempDir::new().unwrap();
        let imgs = images(dir.path(), 5);
        let timing = SlideTiming::plan(10.0, 5, 25).unwrap();

        let manifest = render_manifest(&imgs, &timing).unwrap();
        let lines: Vec<&str> = manifest.lines().collect();

        assert_eq!(lines.len(), 11);
        assert_eq!(lines.iter().filter(|l| l.starts_with("duration ")).count(), 5);
        assert!(lines.iter().filter(|l| l.starts_with("duration ")).all(|l| *l == "duration 2.000000"));
        assert_eq!(lines[10], lines[8]);
        assert!(lines[10].ends_with("scene_5.png'"));
        let first = lines[0].trim_start_matches("file '").trim_end_matches('\'');
        assert!(Path::new(first).is_absolute());
    }

    #[test]
    fn manifest_escapes_single_quotes() {
        assert_eq!(
            quote_manifest_path(Path::new("/tmp/it's.png")),
            "/tmp/it'\\''s.png"
        );
    }

    #[test]
    fn manifest_rejects_missing_image() {
        let timing = SlideTiming::plan(4.0, 1, 25).unwrap();
        let err = render_manifest(&[PathBuf::from("/nonexistent/scene_1.png")], &timing);
        assert!(matches!(err, Err(VideoError::Precondition(_))));
    }

    #[test]
    fn manifest_job_uses_concat_demuxer() {
        let cfg = CompositionConfig::default();
        let timing = SlideTiming::plan(4.0, 2, 25).unwrap();
        let job = manifest_job(Path::new("/w/list.txt"), Path::new("/w/out.mp4"), &timing, &cfg);
        assert_eq!(job.stage, Stage::Slideshow);
        assert_eq!(job.value_of("-f").as_deref(), Some("concat"));
        assert_eq!(job.value_of("-safe").as_deref(), Some("0"));
        assert_eq!(job.value_of("-i").as_deref(), Some("/w/list.txt"));
        let vf = job.value_of("-vf").unwrap();
        assert!(vf.contains("scale=1024:1024"));
        assert!(vf.contains("fps=25"));
        assert!(job.args_lossy().contains(&"-an".to_string()));
    }

    #[test]
    fn slideshow_is_encoded_at_the_planned_frame_rate() {
        let cfg = CompositionConfig::default();
        let timing = SlideTiming::plan(4.0, 2, 30).unwrap();
        let job = manifest_job(Path::new("/w/list.txt"), Path::new("/w/out.mp4"), &timing, &cfg);
        let vf = job.value_of("-vf").unwrap();
        assert!(vf.contains("fps=30"), "{vf}");
        assert!(!vf.contains("fps=25"), "{vf}");

        let imgs = vec![PathBuf::from("/i/scene_1.png"), PathBuf::from("/i/scene_2.png")];
        let job = per_image_job(&imgs, &timing, Path::new("/w/out.mp4"), &cfg, None);
        let graph = job.value_of("-filter_complex").unwrap();
        assert!(graph.contains("trim=end_frame=60"), "{graph}");
        assert_eq!(job.value_of("-framerate").as_deref(), Some("30"));
        assert!(!graph.contains("fps=25"), "{graph}");
    }

    #[test]
    fn per_image_job_zooms_each_slide_for_its_frames() {
        let imgs: Vec<PathBuf> = (1..=3).map(|i| PathBuf::from(format!("/i/scene_{i}.png"))).collect();
        let timing = SlideTiming::plan(6.0, 3, 24).unwrap();
        let cfg = CompositionConfig::default();
        let job = per_image_job(&imgs, &timing, Path::new("/w/out.mp4"), &cfg, Some(1.1));

        let args = job.args_lossy();
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
        let graph = job.value_of("-filter_complex").unwrap();
        assert_eq!(graph.matches("zoompan=").count(), 3);
        assert!(graph.contains("d=48:s=1024x1024:fps=24"));
        assert!(graph.contains("[v0][v1][v2]concat=n=3:v=1:a=0,fps=24,format=yuv420p[v]"));
        assert!(!graph.contains("fps=25"));
        assert_eq!(job.value_of("-map").as_deref(), Some("[v]"));
    }

    #[test]
    fn per_image_job_without_zoom_loops_and_trims() {
        let imgs = vec![PathBuf::from("/i/scene_1.png"), PathBuf::from("/i/scene_2.png")];
        let timing = SlideTiming::plan(5.0, 2, 25).unwrap();
        let cfg = CompositionConfig::default();
        let job = per_image_job(&imgs, &timing, Path::new("/w/out.mp4"), &cfg, None);

        let graph = job.value_of("-filter_complex").unwrap();
        assert!(!graph.contains("zoompan"));
        assert!(graph.contains("trim=end_frame=63"));
        assert!(graph.contains("trim=end_frame=62"));
        assert_eq!(job.value_of("-loop").as_deref(), Some("1"));
    }
}
