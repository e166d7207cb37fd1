//! Speech synthesis
//!
//! `SpeechBackend` reads text aloud and returns MP3 audio. Used by the
//! `/tts` endpoint to preview lyrics as speech.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Longest text accepted in one synthesis call, in characters
pub const MAX_SPEECH_CHARS: usize = 4096;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("text is required")]
    EmptyText,

    #[error("text is too long: {0} characters (at most {MAX_SPEECH_CHARS})")]
    TooLong(usize),

    #[error("timeout")]
    Timeout,

    #[error("speech backend request failed: {0}")]
    Request(String),

    #[error("speech backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("speech backend returned no audio")]
    EmptyAudio,
}

/// Turns text into MP3 audio
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// Trims `text` and checks it is fit for synthesis.
pub fn speakable(text: &str) -> Result<&str, SpeechError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SpeechError::EmptyText);
    }
    let chars = text.chars().count();
    if chars > MAX_SPEECH_CHARS {
        return Err(SpeechError::TooLong(chars));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speakable_trims_and_bounds_text() {
        assert_eq!(speakable("  가을비  \n").unwrap(), "가을비");
        assert!(matches!(speakable(" \n\t"), Err(SpeechError::EmptyText)));

        let long = "라".repeat(MAX_SPEECH_CHARS + 1);
        assert!(matches!(speakable(&long), Err(SpeechError::TooLong(n)) if n == MAX_SPEECH_CHARS + 1));
        assert!(speakable(&long[..MAX_SPEECH_CHARS * 3]).is_ok());
    }
}
