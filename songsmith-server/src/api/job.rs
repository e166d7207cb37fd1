//! Job API Handlers
//!
//! Read access to job records.

use axum::{
    Json,
    extract::{Path, State},
};
use songsmith_core::dto::job::JobDetails;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::service::Pipeline;

/// GET /job/{id}
/// Job record with stage statuses, lyrics, last error and artifact names
pub async fn get_job(
    State(pipeline): State<Pipeline>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobDetails>> {
    tracing::debug!("Getting job: {}", id);

    let details = pipeline.job_details(id).await?;
    Ok(Json(details))
}
