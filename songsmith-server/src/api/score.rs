//! Score API Handlers

use axum::{Json, extract::State};
use songsmith_core::domain::artifact::ArtifactKind;
use songsmith_core::dto::score::{GenerateScoreRequest, GenerateScoreResponse};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::service::{Pipeline, PipelineError, ScoreOrigin};

/// POST /generate-score
/// Engraves the job's melody, or a chord progression when `chords` is set
pub async fn generate_score(
    State(pipeline): State<Pipeline>,
    Json(req): Json<GenerateScoreRequest>,
) -> ApiResult<Json<GenerateScoreResponse>> {
    let instruments = req.instrument_names();

    let chords = req
        .chords
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let (job_id, origin) = match chords {
        Some(progression) => {
            let job_id = match req.job_id {
                Some(id) => id,
                None => pipeline.create_score_job().await?.id,
            };
            let origin = ScoreOrigin::Chords {
                progression: progression.to_string(),
                repeat: req.repeat.unwrap_or(1).max(1),
            };
            (job_id, origin)
        }
        None => (midi_job(&pipeline, &req).await?, ScoreOrigin::StoredMidi),
    };

    tracing::info!("Generating score for job {}", job_id);
    let score = pipeline.run_score(job_id, origin, &instruments).await?;

    Ok(Json(GenerateScoreResponse {
        score_path: score.public_name(),
        job_id,
    }))
}

/// Works out which job's MIDI to engrave.
///
/// `midi_path` is only ever read as a public artifact name, never as a
/// filesystem path, and must name a file that is actually stored.
async fn midi_job(pipeline: &Pipeline, req: &GenerateScoreRequest) -> ApiResult<Uuid> {
    let named = match req.midi_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(name) => {
            let not_stored =
                || PipelineError::DependencyMissing(format!("'{}' is not a stored MIDI file", name));
            let artifact = pipeline
                .store()
                .resolve_public_name(name)
                .map_err(|_| not_stored())?;
            if artifact.kind != ArtifactKind::Midi {
                return Err(ApiError::BadRequest(format!("'{}' is not a MIDI file", name)));
            }
            let stored = pipeline
                .store()
                .find(artifact.job_id, ArtifactKind::Midi)
                .await
                .map_err(PipelineError::from)?;
            if stored.as_ref() != Some(&artifact) {
                return Err(not_stored().into());
            }
            Some(artifact.job_id)
        }
        None => None,
    };

    match (req.job_id, named) {
        (Some(id), Some(named)) if id != named => Err(ApiError::BadRequest(
            "midi_path belongs to a different job".to_string(),
        )),
        (Some(id), _) | (None, Some(id)) => Ok(id),
        (None, None) => Err(ApiError::BadRequest(
            "job_id or midi_path is required".to_string(),
        )),
    }
}
