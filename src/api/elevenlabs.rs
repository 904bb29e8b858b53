use super::{clean_story, NarrationGenerator};
use crate::error::{Result, VideoError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const ELEVENLABS_TTS_API: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const TTS_MODEL: &str = "eleven_multilingual_v2";

#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    api_key: String,
    voice_id: String,
    client: Client,
    output_dir: PathBuf,
}

impl ElevenLabsClient {
    pub fn new(
        api_key: String,
        voice_id: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            api_key,
            voice_id: voice_id.into(),
            client,
            output_dir: output_dir.into(),
        })
    }
}

#[async_trait]
impl NarrationGenerator for ElevenLabsClient {
    async fn generate_narration(&self, text: &str, filename: &str) -> Result<PathBuf> {
        info!("Generating narration with ElevenLabs TTS...");
        let text = clean_story(text);

        let response = self
            .client
            .post(format!("{}/{}", ELEVENLABS_TTS_API, self.voice_id))
            .query(&[("output_format", "mp3_44100_128")])
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": TTS_MODEL,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(VideoError::Api(format!(
                "ElevenLabs TTS error ({}): {}",
                status, error_text
            )));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(VideoError::Generation(
                "ElevenLabs returned empty audio".to_string(),
            ));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let audio_path = self.output_dir.join(filename);
        tokio::fs::write(&audio_path, &audio).await?;

        info!("Narration saved to: {}", audio_path.display());
        Ok(audio_path)
    }
}
