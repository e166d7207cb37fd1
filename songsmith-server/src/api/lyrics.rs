//! Lyrics API Handlers

use axum::{Json, extract::State};
use songsmith_core::dto::lyrics::{GenerateLyricsRequest, GenerateLyricsResponse};

use crate::api::error::ApiResult;
use crate::service::Pipeline;

/// POST /generate-lyrics
/// Starts a job and settles its lyrics
pub async fn generate_lyrics(
    State(pipeline): State<Pipeline>,
    Json(req): Json<GenerateLyricsRequest>,
) -> ApiResult<Json<GenerateLyricsResponse>> {
    let job = pipeline.create_job(req.into_brief()).await?;
    tracing::info!("Generating lyrics for job {}", job.id);

    let lyrics = pipeline.run_lyrics(job.id).await?;
    Ok(Json(GenerateLyricsResponse {
        lyrics,
        job_id: job.id,
    }))
}
