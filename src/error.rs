use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    /// Input that makes the run impossible, detected before FFmpeg is touched
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// FFmpeg/ffprobe exited non-zero; both captured streams are kept for diagnosis
    #[error("FFmpeg {stage} step failed ({status}): {}", stderr.trim())]
    Composition {
        stage: &'static str,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[error("FFmpeg {stage} step timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl VideoError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VideoError>;
