//! Download API Handler
//!
//! Streams stored artifacts to clients by their public name.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::repository::StoreError;
use crate::service::{Pipeline, PipelineError};

const STREAM_BUFFER: usize = 4096 * 16;

/// GET /download/{filename}
/// Streams an artifact as an attachment, or 404
pub async fn download(
    State(pipeline): State<Pipeline>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let store = pipeline.store();
    let not_found = || ApiError::NotFound(format!("File not found: {}", filename));

    let artifact = store.resolve_public_name(&filename).map_err(|_| not_found())?;
    let file = store.open(&artifact).await.map_err(|e| match e {
        StoreError::NotFound(_) => not_found(),
        other => ApiError::Pipeline(PipelineError::Storage(other)),
    })?;
    let length = file
        .metadata()
        .await
        .map(|m| m.len())
        .map_err(|e| ApiError::Pipeline(PipelineError::Storage(StoreError::io(store.root(), e))))?;

    tracing::debug!("Streaming {} ({} bytes)", artifact.public_name(), length);

    let reader = BufReader::with_capacity(STREAM_BUFFER, file);
    let body = Body::from_stream(ReaderStream::with_capacity(reader, STREAM_BUFFER));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.content_type())
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.public_name()),
        )
        .body(body)
        .map_err(|e| ApiError::Pipeline(PipelineError::Backend(e.to_string())))
}
