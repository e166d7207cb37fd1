//! Song API Handlers

use axum::{Json, extract::State};
use songsmith_core::dto::song::{GenerateSongRequest, GenerateSongResponse};

use crate::api::error::ApiResult;
use crate::service::Pipeline;

/// POST /generate-song
/// Generates melody and audio, reusing the job named by `job_id` if any
pub async fn generate_song(
    State(pipeline): State<Pipeline>,
    Json(req): Json<GenerateSongRequest>,
) -> ApiResult<Json<GenerateSongResponse>> {
    let overrides = req.style_params();
    let job_id = match req.job_id {
        Some(id) => pipeline.get_job(id).await?.id,
        None => pipeline.create_job(req.into_brief()).await?.id,
    };
    tracing::info!("Generating song for job {}", job_id);

    let artifacts = pipeline.run_melody(job_id, &overrides).await?;
    Ok(Json(GenerateSongResponse {
        midi_path: artifacts.midi.public_name(),
        audio_path: artifacts.audio.public_name(),
        job_id,
    }))
}
