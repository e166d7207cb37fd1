//! Speech DTOs

use serde::{Deserialize, Serialize};

/// Body of `POST /tts`
///
/// The response is the spoken text as `audio/mpeg`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}
