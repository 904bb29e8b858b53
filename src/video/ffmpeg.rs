//! The single seam through which every stage reaches FFmpeg.
//!
//! Stages only build [`FfmpegJob`]s; a [`MediaTool`] executes them. The
//! production tool shells out to `ffmpeg`/`ffprobe`, tests substitute a
//! recording fake.

use crate::config::CompositionConfig;
use crate::error::{Result, VideoError};
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Probe,
    Slideshow,
    LoopMusic,
    AttenuateMusic,
    MixAudio,
    Mux,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Probe => "probe",
            Stage::Slideshow => "slideshow",
            Stage::LoopMusic => "loop-music",
            Stage::AttenuateMusic => "attenuate-music",
            Stage::MixAudio => "mix-audio",
            Stage::Mux => "mux",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One blocking FFmpeg invocation producing exactly one output file.
#[derive(Debug, Clone)]
pub struct FfmpegJob {
    pub stage: Stage,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl FfmpegJob {
    pub fn new(stage: Stage, output: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            args: Vec::new(),
            output: output.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn input(self, path: impl AsRef<OsStr>) -> Self {
        self.arg("-i").arg(path)
    }

    /// Full argument vector, output path last.
    pub fn command_line(&self) -> Vec<OsString> {
        let mut argv: Vec<OsString> = ["-y", "-hide_banner", "-nostdin", "-loglevel", "error"]
            .iter()
            .map(OsString::from)
            .collect();
        argv.extend(self.args.iter().cloned());
        argv.push(self.output.clone().into_os_string());
        argv
    }

    /// Lossy string view of the arguments, handy for logs and assertions.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<String> {
        let args = self.args_lossy();
        let pos = args.iter().position(|a| a == flag)?;
        args.get(pos + 1).cloned()
    }
}

#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Run a job to completion; a non-zero exit is a [`VideoError::Composition`].
    async fn run(&self, job: &FfmpegJob) -> Result<()>;

    /// Container duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

/// `ffmpeg`/`ffprobe` on the host.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    timeout: Option<Duration>,
}

impl Ffmpeg {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &CompositionConfig) -> Self {
        Self::new(&config.ffmpeg_bin, &config.ffprobe_bin).with_timeout(config.stage_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn execute(&self, stage: Stage, bin: &str, args: &[OsString]) -> Result<Output> {
        debug!("{} {} {:?}", stage, bin, args);
        let child = Command::new(bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VideoError::precondition(format!("'{bin}' was not found on PATH"))
                } else {
                    VideoError::Io(e)
                }
            })?;

        let output = match self.timeout {
            // Dropping the future on timeout drops the child, which kills it.
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| VideoError::Timeout {
                    stage: stage.as_str(),
                    secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(VideoError::Composition {
                stage: stage.as_str(),
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::from_config(&CompositionConfig::default())
    }
}

#[async_trait]
impl MediaTool for Ffmpeg {
    async fn run(&self, job: &FfmpegJob) -> Result<()> {
        self.execute(job.stage, &self.ffmpeg_bin, &job.command_line())
            .await?;
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "json".into(),
            path.as_os_str().to_os_string(),
        ];
        let output = self.execute(Stage::Probe, &self.ffprobe_bin, &args).await?;
        parse_probe_duration(&output.stdout).ok_or_else(|| {
            VideoError::precondition(format!(
                "could not read a duration for '{}'",
                path.display()
            ))
        })
    }
}

fn parse_probe_duration(stdout: &[u8]) -> Option<f64> {
    #[derive(Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(Deserialize)]
    struct ProbeOut {
        format: ProbeFormat,
    }

    let parsed: ProbeOut = serde_json::from_slice(stdout).ok()?;
    parsed.format.duration?.trim().parse::<f64>().ok()
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    is_runnable("ffmpeg")
}

/// Return `true` when `bin -version` runs and exits successfully.
pub fn is_runnable(bin: &str) -> bool {
    std::process::Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
