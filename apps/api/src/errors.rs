use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::output::render::RenderError;
use crate::pipeline::PipelineError;
use crate::retrieval::RetrievalError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Incomplete input: {}", .0.join("; "))]
    IncompleteInput(Vec<String>),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    RefinementLimitExceeded(String),

    /// A fatal pipeline error. The run is `Failed` and reports the same reason.
    #[error("Run {run_id} failed: {source}")]
    PipelineFailed {
        run_id: Uuid,
        #[source]
        source: PipelineError,
    },

    /// A generation call failed outside a run's own stages; the run is unaffected.
    #[error("Upstream service failed: {message}")]
    Upstream { code: &'static str, message: String },

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Retrieval backend unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a pipeline error raised while operating on `run_id`.
    pub fn pipeline(run_id: Uuid, err: PipelineError) -> Self {
        if err.is_fatal() {
            return AppError::PipelineFailed {
                run_id,
                source: err,
            };
        }
        AppError::from(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::IncompleteInput(problems) => AppError::IncompleteInput(problems),
            PipelineError::RunNotFound(id) => AppError::NotFound(format!("Run {id} not found")),
            PipelineError::RefinementLimitExceeded { .. } => {
                AppError::RefinementLimitExceeded(err.to_string())
            }
            PipelineError::InvalidState { .. }
            | PipelineError::StaleDraft { .. }
            | PipelineError::Cancelled => AppError::Conflict(err.to_string()),
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidDocument(msg) => AppError::Validation(msg),
            RetrievalError::Unavailable(msg) => AppError::RetrievalUnavailable(msg),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::RenderFailed(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut run_id = None;
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::IncompleteInput(_) => (
                StatusCode::BAD_REQUEST,
                "INCOMPLETE_INPUT",
                self.to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "INVALID_STATE", msg.clone()),
            AppError::RefinementLimitExceeded(msg) => (
                StatusCode::CONFLICT,
                "REFINEMENT_LIMIT_EXCEEDED",
                msg.clone(),
            ),
            AppError::PipelineFailed { run_id: id, source } => {
                run_id = Some(*id);
                let status = match source {
                    PipelineError::ContextTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => {
                        tracing::error!("Run {id} failed: {source}");
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, source.code(), source.to_string())
            }
            AppError::Upstream { code, message } => {
                tracing::error!("Upstream error: {message}");
                (StatusCode::BAD_GATEWAY, *code, message.clone())
            }
            AppError::RenderFailed(msg) => {
                tracing::error!("Render error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "RENDER_FAILED",
                    format!("{msg}. The Markdown version is still available from /markdown"),
                )
            }
            AppError::RetrievalUnavailable(msg) => {
                tracing::error!("Retrieval error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "RETRIEVAL_UNAVAILABLE",
                    "The retrieval backend is unavailable".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(id) = run_id {
            error["run_id"] = json!(id);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::StageName;

    #[test]
    fn test_fatal_pipeline_errors_carry_the_run_id() {
        let run_id = Uuid::new_v4();
        let err = AppError::pipeline(
            run_id,
            PipelineError::ServiceUnavailable {
                stage: StageName::CompanyAnalysis,
                attempts: 3,
                message: "503".to_string(),
            },
        );
        assert!(matches!(err, AppError::PipelineFailed { run_id: id, .. } if id == run_id));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_context_too_large_is_unprocessable() {
        let err = AppError::pipeline(
            Uuid::new_v4(),
            PipelineError::ContextTooLarge {
                stage: StageName::CompanyAnalysis,
                required: 100,
                budget: 10,
            },
        );
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_rejections_map_to_client_errors() {
        let cases = [
            (PipelineError::IncompleteInput(vec![]), StatusCode::BAD_REQUEST),
            (
                PipelineError::RefinementLimitExceeded { limit: 3 },
                StatusCode::CONFLICT,
            ),
            (
                PipelineError::StaleDraft {
                    submitted: 1,
                    current: 2,
                },
                StatusCode::CONFLICT,
            ),
            (PipelineError::RunNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(
                AppError::pipeline(Uuid::nil(), err).into_response().status(),
                status
            );
        }
    }
}
