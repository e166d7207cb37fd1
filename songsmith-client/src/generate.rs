//! Generation endpoints

use crate::SongsmithClient;
use crate::error::Result;
use songsmith_core::dto::lyrics::{GenerateLyricsRequest, GenerateLyricsResponse};
use songsmith_core::dto::score::{GenerateScoreRequest, GenerateScoreResponse};
use songsmith_core::dto::song::{GenerateSongRequest, GenerateSongResponse};
use songsmith_core::dto::speech::SpeechRequest;

impl SongsmithClient {
    /// Settle lyrics for a new job
    ///
    /// Supplied lyrics are returned verbatim; otherwise they are written
    /// from the topic.
    pub async fn generate_lyrics(&self, req: GenerateLyricsRequest) -> Result<GenerateLyricsResponse> {
        let url = format!("{}/generate-lyrics", self.base_url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Generate a melody and its audio rendering
    ///
    /// # Returns
    /// Public download names of the MIDI and audio files
    pub async fn generate_song(&self, req: GenerateSongRequest) -> Result<GenerateSongResponse> {
        let url = format!("{}/generate-song", self.base_url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Engrave a score from a job's melody or from a chord progression
    pub async fn generate_score(&self, req: GenerateScoreRequest) -> Result<GenerateScoreResponse> {
        let url = format!("{}/generate-score", self.base_url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Read text aloud
    ///
    /// # Returns
    /// MP3 audio bytes
    pub async fn text_to_speech(&self, req: SpeechRequest) -> Result<Vec<u8>> {
        let url = format!("{}/tts", self.base_url);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(&req).send().await?;

        let audio = self.check_status(response).await?.bytes().await?;
        Ok(audio.to_vec())
    }
}
