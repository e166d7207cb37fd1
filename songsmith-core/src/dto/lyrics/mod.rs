//! Lyrics stage DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::brief::Brief;

/// Body of `POST /generate-lyrics`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateLyricsRequest {
    #[serde(default, alias = "prompt")]
    pub topic: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
}

impl GenerateLyricsRequest {
    pub fn into_brief(self) -> Brief {
        Brief {
            topic: self.topic,
            lyrics: self.lyrics,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateLyricsResponse {
    pub lyrics: String,
    pub job_id: Uuid,
}
