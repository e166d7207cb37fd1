//! OpenAI-compatible speech backend
//!
//! Calls the `/audio/speech` endpoint and returns the MP3 body as is.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{SpeechBackend, SpeechError};

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    /// Speaking rate, 0.25 to 4.0
    pub speed: f32,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct OpenAiSpeechBackend {
    client: Client,
    config: SpeechConfig,
}

impl OpenAiSpeechBackend {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
    speed: f32,
}

#[async_trait]
impl SpeechBackend for OpenAiSpeechBackend {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!("{}/audio/speech", self.config.base_url.trim_end_matches('/'));
        let body = SpeechBody {
            model: &self.config.model,
            input: text,
            voice: &self.config.voice,
            response_format: "mp3",
            speed: self.config.speed,
        };

        debug!(model = %self.config.model, voice = %self.config.voice, "Sending speech request");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                SpeechError::Timeout
            } else {
                SpeechError::Request(e.to_string())
            }
        };

        let response = builder
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let audio = response.bytes().await.map_err(map_err)?;
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(audio.to_vec())
    }
}
