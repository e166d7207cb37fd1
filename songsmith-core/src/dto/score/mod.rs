//! Score stage DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /generate-score`
///
/// The MIDI source is named either by `job_id` or by the public download
/// name returned from `/generate-song` (`midi_path`). Without either, a
/// `chords` progression (e.g. `"C G Am F"`) may be engraved instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateScoreRequest {
    #[serde(default)]
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub midi_path: Option<String>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub accompaniment: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
    #[serde(default)]
    pub chords: Option<String>,
    #[serde(default)]
    pub repeat: Option<u32>,
}

impl GenerateScoreRequest {
    /// Requested instrument names in priority order: the explicit list,
    /// then `instrument`, then `accompaniment`.
    pub fn instrument_names(&self) -> Vec<String> {
        let listed: Vec<String> = self
            .instruments
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if !listed.is_empty() {
            return listed;
        }

        [self.instrument.as_deref(), self.accompaniment.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|i| !i.is_empty())
            .map(|i| vec![i.to_string()])
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateScoreResponse {
    pub score_path: String,
    pub job_id: Uuid,
}
