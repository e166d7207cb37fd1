//! Melody stage DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::brief::{Brief, StyleParams};

/// Body of `POST /generate-song`
///
/// When `job_id` names an existing job its topic and settled lyrics are
/// reused; any style fields given here refine the stored style.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateSongRequest {
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub tempo: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub accompaniment: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
}

impl GenerateSongRequest {
    /// Style fields of the request, without consuming it.
    pub fn style_params(&self) -> StyleParams {
        StyleParams {
            style: self.style.clone(),
            genre: self.genre.clone(),
            tempo: self.tempo.clone(),
            mood: self.mood.clone(),
            accompaniment: self.accompaniment.clone(),
            instruments: self.instruments.clone(),
        }
    }

    pub fn into_brief(self) -> Brief {
        Brief {
            topic: self.topic,
            lyrics: self.lyrics,
            style: StyleParams {
                style: self.style,
                genre: self.genre,
                tempo: self.tempo,
                mood: self.mood,
                accompaniment: self.accompaniment,
                instruments: self.instruments,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSongResponse {
    pub midi_path: String,
    pub audio_path: String,
    pub job_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_params_match_the_brief_style() {
        let req = GenerateSongRequest {
            job_id: Some(Uuid::new_v4()),
            topic: Some("autumn rain".to_string()),
            genre: Some("ballad".to_string()),
            mood: Some("sad".to_string()),
            instruments: vec!["piano".to_string()],
            ..Default::default()
        };

        let style = req.style_params();
        assert_eq!(style.genre.as_deref(), Some("ballad"));
        assert_eq!(style.instruments, vec!["piano".to_string()]);
        assert_eq!(req.into_brief().style, style);
    }
}
