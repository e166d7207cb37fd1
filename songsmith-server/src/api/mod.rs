//! API Module
//!
//! HTTP API layer for the song pipeline.
//! Each submodule handles endpoints for one pipeline stage.

pub mod download;
pub mod error;
pub mod health;
pub mod job;
pub mod lyrics;
pub mod score;
pub mod song;
pub mod speech;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::Pipeline;

/// Create the main API router with all endpoints
pub fn create_router(pipeline: Pipeline) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Generation endpoints
        .route("/generate-lyrics", post(lyrics::generate_lyrics))
        .route("/generate-song", post(song::generate_song))
        .route("/generate-score", post(score::generate_score))
        .route("/tts", post(speech::text_to_speech))
        // Artifact and job access
        .route("/download/{filename}", get(download::download))
        .route("/job/{id}", get(job::get_job))
        // Add state and middleware
        .with_state(pipeline)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
