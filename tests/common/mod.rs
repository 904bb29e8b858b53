//! Shared fixtures: a recording stand-in for FFmpeg and canned collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use story_video::api::{ImageGenerator, NarrationGenerator, StoryGenerator};
use story_video::video::{FfmpegJob, MediaTool, MusicSelector, Stage};
use story_video::{
    CompositionConfig, CompositionContext, Result, Scene, Story, VideoError, VideoGenerator,
};
use tempfile::TempDir;

/// How a [`FakeTool`] should fail
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Exit(Stage),
    Timeout(Stage),
}

/// Writes a placeholder for every job's output and remembers what it ran.
///
/// Every `-i` input must exist when the job runs, so stages that read a file
/// the previous stage never wrote fail loudly.
pub struct FakeTool {
    duration: f64,
    failure: Option<Failure>,
    pub jobs: Mutex<Vec<FfmpegJob>>,
    pub manifests: Mutex<Vec<String>>,
    pub probes: AtomicUsize,
}

impl FakeTool {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            failure: None,
            jobs: Mutex::new(Vec::new()),
            manifests: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn failing(duration: f64, failure: Failure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(duration)
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.jobs.lock().unwrap().iter().map(|j| j.stage).collect()
    }

    pub fn job(&self, stage: Stage) -> FfmpegJob {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.stage == stage)
            .cloned()
            .unwrap_or_else(|| panic!("no {stage} job ran"))
    }

    pub fn invocations(&self) -> usize {
        self.jobs.lock().unwrap().len() + self.probes.load(Ordering::SeqCst)
    }
}

pub fn inputs(job: &FfmpegJob) -> Vec<String> {
    let args = job.args_lossy();
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == "-i")
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect()
}

#[async_trait]
impl MediaTool for FakeTool {
    async fn run(&self, job: &FfmpegJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());

        for input in inputs(job) {
            assert!(
                Path::new(&input).exists(),
                "{} job read missing input {}",
                job.stage,
                input
            );
        }
        if job.stage == Stage::Slideshow && job.value_of("-f").as_deref() == Some("concat") {
            let manifest = std::fs::read_to_string(inputs(job)[0].as_str())?;
            self.manifests.lock().unwrap().push(manifest);
        }

        // Real FFmpeg leaves a truncated file behind when it dies mid-encode.
        std::fs::write(&job.output, b"fake media")?;

        match self.failure {
            Some(Failure::Exit(stage)) if stage == job.stage => Err(VideoError::Composition {
                stage: stage.as_str(),
                status: ExitStatus::from_raw(1 << 8),
                stdout: String::new(),
                stderr: "Error while opening encoder for output stream #0:0".to_string(),
            }),
            Some(Failure::Timeout(stage)) if stage == job.stage => Err(VideoError::Timeout {
                stage: stage.as_str(),
                secs: 1,
            }),
            _ => Ok(()),
        }
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        assert!(path.exists(), "probed missing file {}", path.display());
        Ok(self.duration)
    }
}

/// Directory layout of one test run
pub struct Fixture {
    pub root: TempDir,
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    pub music_dir: PathBuf,
    pub narration: PathBuf,
}

impl Fixture {
    pub fn new(image_count: usize, music_tracks: &[&str]) -> Self {
        let root = TempDir::new().unwrap();
        let image_dir = root.path().join("output_images");
        let video_dir = root.path().join("output_videos");
        let music_dir = root.path().join("music");
        for dir in [&image_dir, &video_dir, &music_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        for i in 1..=image_count {
            std::fs::write(image_dir.join(format!("scene_{i}.png")), b"png").unwrap();
        }
        for track in music_tracks {
            std::fs::write(music_dir.join(track), b"mp3").unwrap();
        }
        let narration = video_dir.join("narration.mp3");
        std::fs::write(&narration, b"mp3").unwrap();

        Self {
            root,
            image_dir,
            video_dir,
            music_dir,
            narration,
        }
    }

    pub fn images(&self) -> Vec<PathBuf> {
        story_video::video::collect_scene_images(&self.image_dir).unwrap()
    }

    pub fn generator(
        &self,
        config: CompositionConfig,
        tool: Arc<FakeTool>,
        selector: Arc<dyn MusicSelector>,
    ) -> VideoGenerator {
        let ctx = CompositionContext::new(config, tool, selector).unwrap();
        VideoGenerator::new(&self.video_dir, &self.music_dir, ctx)
    }

    /// Hidden scratch directories left in the video directory.
    pub fn leftover_scratch(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.video_dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(".compose-"))
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn story(scene_count: usize) -> Story {
    Story {
        title: "The Last Stargazer!".to_string(),
        scenes: (1..=scene_count)
            .map(|i| Scene::new(format!("Scene {i} text."), format!("prompt {i}")))
            .collect(),
    }
}

pub struct FakeStories(pub Result<Story>);

#[async_trait]
impl StoryGenerator for FakeStories {
    async fn generate_story(&self, _prompt: &str) -> Result<Story> {
        match &self.0 {
            Ok(story) => Ok(story.clone()),
            Err(VideoError::Generation(msg)) => Err(VideoError::Generation(msg.clone())),
            Err(other) => panic!("unsupported canned error {other:?}"),
        }
    }
}

/// Writes `scene_<n>.png` into `dir`, except for the 0-based indices in `skip`.
pub struct FakeImages {
    pub dir: PathBuf,
    pub skip: Vec<usize>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate_image(&self, _prompt: &str, index: usize) -> Option<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.skip.contains(&index) {
            return None;
        }
        let path = self.dir.join(story_video::video::scene_image_name(index + 1));
        std::fs::write(&path, b"png").ok()?;
        Some(path)
    }
}

pub struct FakeNarrator {
    pub dir: PathBuf,
    pub texts: Mutex<Vec<String>>,
}

#[async_trait]
impl NarrationGenerator for FakeNarrator {
    async fn generate_narration(&self, text: &str, filename: &str) -> Result<PathBuf> {
        self.texts.lock().unwrap().push(text.to_string());
        let path = self.dir.join(filename);
        std::fs::write(&path, b"mp3")?;
        Ok(path)
    }
}
