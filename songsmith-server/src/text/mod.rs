//! Lyrics generation
//!
//! `TextBackend` abstracts a chat-style completion service. `TextGenerator`
//! wraps it with the lyricist persona and turns a topic into song lyrics.

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// A single completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("timeout")]
    Timeout,

    #[error("text backend request failed: {0}")]
    Request(String),

    #[error("text backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("text backend returned an empty completion")]
    EmptyCompletion,

    #[error("a topic or lyrics are required")]
    MissingTopic,
}

/// Completes a prompt with a text model
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TextGenError>;
}

/// Tunables of the lyricist persona
#[derive(Debug, Clone)]
pub struct LyricsStyle {
    /// Language the lyrics are written in
    pub language: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LyricsStyle {
    fn default() -> Self {
        Self {
            language: "Korean".to_string(),
            temperature: 0.9,
            max_tokens: 1024,
        }
    }
}

/// Writes song lyrics about a topic
#[derive(Clone)]
pub struct TextGenerator {
    backend: Arc<dyn TextBackend>,
    style: LyricsStyle,
}

impl TextGenerator {
    pub fn new(backend: Arc<dyn TextBackend>, style: LyricsStyle) -> Self {
        Self { backend, style }
    }

    fn request_for(&self, topic: &str) -> CompletionRequest {
        let language = &self.style.language;
        CompletionRequest {
            system: format!(
                "You are an emotional {language} lyricist. Write song lyrics with two verses \
                 that carry the feeling of the given topic."
            ),
            prompt: format!(
                "Write lyrics in {language} about \"{topic}\", using [Verse] and [Chorus] sections."
            ),
            max_tokens: self.style.max_tokens,
            temperature: self.style.temperature,
        }
    }

    /// Generates lyrics for `topic`
    ///
    /// Blank topics and blank completions are errors.
    pub async fn lyrics_for(&self, topic: &str) -> Result<String, TextGenError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(TextGenError::MissingTopic);
        }

        info!("Generating lyrics about '{}'", topic);
        let text = self.backend.complete(self.request_for(topic)).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TextGenError::EmptyCompletion);
        }

        debug!("Generated {} characters of lyrics", text.len());
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBackend {
        reply: String,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl TextBackend for RecordingBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<String, TextGenError> {
            self.calls.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn generator(reply: &str) -> (TextGenerator, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        });
        (
            TextGenerator::new(backend.clone(), LyricsStyle::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn test_lyrics_for_uses_persona() {
        let (generator, backend) = generator("  [Verse]\nRain on the glass\n");

        let lyrics = generator.lyrics_for("autumn rain").await.unwrap();
        assert_eq!(lyrics, "[Verse]\nRain on the glass");

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system.contains("Korean lyricist"));
        assert!(calls[0].prompt.contains("\"autumn rain\""));
        assert!(calls[0].prompt.contains("[Verse] and [Chorus]"));
        assert_eq!(calls[0].temperature, 0.9);
    }

    #[tokio::test]
    async fn test_blank_topic_makes_no_call() {
        let (generator, backend) = generator("unused");

        assert!(matches!(
            generator.lyrics_for("   ").await,
            Err(TextGenError::MissingTopic)
        ));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_completion_is_rejected() {
        let (generator, _) = generator("\n  \n");
        assert!(matches!(
            generator.lyrics_for("autumn rain").await,
            Err(TextGenError::EmptyCompletion)
        ));
    }
}
