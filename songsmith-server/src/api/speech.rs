//! Speech API Handlers

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use songsmith_core::dto::speech::SpeechRequest;

use crate::api::error::ApiResult;
use crate::service::Pipeline;

/// POST /tts
/// Reads the given text aloud and returns it as MP3
pub async fn text_to_speech(
    State(pipeline): State<Pipeline>,
    Json(req): Json<SpeechRequest>,
) -> ApiResult<Response> {
    let audio = pipeline.speak(&req.text).await?;
    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
