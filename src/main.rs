use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use story_video::api::{ElevenLabsClient, GeminiClient};
use story_video::video::ffmpeg::is_runnable;
use story_video::video::{Ffmpeg, MusicSelector, RandomSelector, SeededSelector};
use story_video::{AppConfig, CompositionContext, StoryPipeline, VideoGenerator};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "story-video")]
#[command(about = "Turn one prompt into a narrated slideshow video", long_about = None)]
struct Args {
    /// Prompt for the story
    #[arg(short, long)]
    prompt: Option<String>,

    /// Read the prompt from a file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for generated scene images
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Directory for the narration and the final video
    #[arg(long)]
    video_dir: Option<PathBuf>,

    /// Directory holding background music (*.mp3)
    #[arg(long)]
    music_dir: Option<PathBuf>,

    /// Seed for background music choice (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Keep scene images after the run
    #[arg(long)]
    keep_images: bool,

    /// Google API key (Gemini)
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// ElevenLabs API key
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    elevenlabs_api_key: Option<String>,

    /// ElevenLabs voice
    #[arg(long, env = "ELEVENLABS_VOICE_ID")]
    voice_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before the log filter and clap read the environment
    load_environment(None);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if let Some(dir) = args.image_dir {
        config.paths.image_dir = dir;
    }
    if let Some(dir) = args.video_dir {
        config.paths.video_dir = dir;
    }
    if let Some(dir) = args.music_dir {
        config.paths.music_dir = dir;
    }
    if let Some(voice) = args.voice_id {
        config.voice_id = voice;
    }

    let Some(google_api_key) = args.google_api_key else {
        bail!("GOOGLE_API_KEY not found. Set it via --google-api-key or the environment");
    };
    let Some(elevenlabs_api_key) = args.elevenlabs_api_key else {
        bail!("ELEVENLABS_API_KEY not found. Set it via --elevenlabs-api-key or the environment");
    };

    if !is_runnable(&config.composition.ffmpeg_bin) {
        bail!(
            "'{}' is required for video composition but could not be run",
            config.composition.ffmpeg_bin
        );
    }

    let prompt = match (args.prompt, args.file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?,
        (None, None) => read_prompt_from_stdin().await?,
    };
    if prompt.trim().is_empty() {
        bail!("The prompt is empty");
    }

    for dir in [
        &config.paths.image_dir,
        &config.paths.video_dir,
        &config.paths.music_dir,
    ] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    info!("Starting story video generation...");
    info!("Prompt length: {} characters", prompt.len());

    let pipeline = build_pipeline(&config, google_api_key, elevenlabs_api_key, args.seed, args.keep_images)?;

    match pipeline.run(prompt.trim()).await {
        Ok(result) => {
            info!("Final video saved: {}", result.video.display());
            println!("{}", result.video.display());
            Ok(())
        }
        Err(e) => {
            error!("Video generation failed: {}", e);
            Err(e).context("Video generation failed")
        }
    }
}

/// Load `.env` (or `env_file`) without overriding variables already set.
fn load_environment(env_file: Option<&Path>) {
    let _ = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
}

/// `RUST_LOG`, defaulting to `info`.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn build_pipeline(
    config: &AppConfig,
    google_api_key: String,
    elevenlabs_api_key: String,
    seed: Option<u64>,
    keep_images: bool,
) -> anyhow::Result<StoryPipeline> {
    let gemini = Arc::new(
        GeminiClient::new(google_api_key, &config.paths.image_dir)
            .context("Failed to create Gemini client")?,
    );
    let narrator = Arc::new(
        ElevenLabsClient::new(
            elevenlabs_api_key,
            &config.voice_id,
            &config.paths.video_dir,
        )
        .context("Failed to create ElevenLabs client")?,
    );

    let selector: Arc<dyn MusicSelector> = match seed {
        Some(seed) => Arc::new(SeededSelector(seed)),
        None => Arc::new(RandomSelector),
    };
    let ctx = CompositionContext::new(
        config.composition.clone(),
        Arc::new(Ffmpeg::from_config(&config.composition)),
        selector,
    )
    .context("Invalid composition settings")?;

    Ok(StoryPipeline {
        stories: gemini.clone(),
        images: gemini,
        narrator,
        video: VideoGenerator::new(&config.paths.video_dir, &config.paths.music_dir, ctx),
        image_dir: config.paths.image_dir.clone(),
        narration_file: config.narration_file.clone(),
        keep_images,
    })
}

async fn read_prompt_from_stdin() -> anyhow::Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Enter a prompt for your video: ").await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines
        .next_line()
        .await
        .context("Failed to read prompt from stdin")?;
    Ok(line.unwrap_or_default())
}
