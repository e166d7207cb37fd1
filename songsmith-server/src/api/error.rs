//! API Error Handling
//!
//! Unified error types and conversion for API responses. Every error body
//! is `{"error": <reason>, "kind": <category>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use songsmith_core::dto::ErrorBody;

use crate::service::PipelineError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Pipeline(PipelineError),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "input", msg),
            ApiError::Pipeline(err) => {
                let kind = err.kind();
                match err {
                    PipelineError::Input(_) | PipelineError::DependencyMissing(_) => {
                        (StatusCode::BAD_REQUEST, kind, err.to_string())
                    }
                    PipelineError::JobNotFound(_) => (StatusCode::NOT_FOUND, kind, err.to_string()),
                    PipelineError::Backend(_) | PipelineError::Render(_) => {
                        tracing::warn!("Generation failed: {}", err);
                        (StatusCode::INTERNAL_SERVER_ERROR, kind, err.to_string())
                    }
                    PipelineError::Storage(_) => {
                        tracing::error!("Storage error: {}", err);
                        (StatusCode::INTERNAL_SERVER_ERROR, kind, err.to_string())
                    }
                    PipelineError::Database(ref db) => {
                        tracing::error!("Database error: {:?}", db);
                        (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            kind,
                            "Internal server error".to_string(),
                        )
                    }
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = self.parts();
        let body = ErrorBody {
            error,
            kind: Some(kind.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;
    use crate::score::RenderError;
    use uuid::Uuid;

    fn status_of(err: PipelineError) -> (StatusCode, &'static str) {
        let (status, kind, _) = ApiError::from(err).parts();
        (status, kind)
    }

    #[test]
    fn test_pipeline_errors_map_to_status_codes() {
        assert_eq!(
            status_of(PipelineError::Input("x".into())),
            (StatusCode::BAD_REQUEST, "input")
        );
        assert_eq!(
            status_of(PipelineError::Backend("timeout".into())),
            (StatusCode::INTERNAL_SERVER_ERROR, "backend")
        );
        assert_eq!(
            status_of(PipelineError::DependencyMissing("x".into())),
            (StatusCode::BAD_REQUEST, "dependency_missing")
        );
        assert_eq!(
            status_of(PipelineError::Render(RenderError::Timeout)),
            (StatusCode::INTERNAL_SERVER_ERROR, "render")
        );
        assert_eq!(
            status_of(PipelineError::Storage(StoreError::NotFound("x".into()))),
            (StatusCode::INTERNAL_SERVER_ERROR, "storage")
        );
        assert_eq!(
            status_of(PipelineError::JobNotFound(Uuid::nil())),
            (StatusCode::NOT_FOUND, "not_found")
        );
    }

    #[test]
    fn test_database_details_are_hidden() {
        let (_, _, message) = ApiError::from(PipelineError::Database(sqlx::Error::PoolTimedOut)).parts();
        assert_eq!(message, "Internal server error");
    }
}
