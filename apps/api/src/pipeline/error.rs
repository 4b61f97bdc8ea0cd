use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::stage::StageName;

/// Everything that can stop or reject a pipeline operation.
///
/// Fatal variants end the run in `Failed`; the rest reject a single request and
/// leave the run where it was.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Incomplete input: {}", .0.join("; "))]
    IncompleteInput(Vec<String>),

    #[error(
        "Context for stage {stage} too large: required fields need {required} chars, budget is {budget}"
    )]
    ContextTooLarge {
        stage: StageName,
        required: usize,
        budget: usize,
    },

    #[error("Stage {stage} is missing required input '{field}'")]
    MissingStageInput {
        stage: StageName,
        field: &'static str,
    },

    #[error("Stage {stage} produced invalid output after {attempts} attempts: {reason}")]
    StageOutputInvalid {
        stage: StageName,
        attempts: u32,
        reason: String,
    },

    #[error("Generation service unavailable for stage {stage} after {attempts} attempts: {message}")]
    ServiceUnavailable {
        stage: StageName,
        attempts: u32,
        message: String,
    },

    #[error("Generation service rejected the request for stage {stage}: {message}")]
    ServiceRejected { stage: StageName, message: String },

    #[error("Refinement limit of {limit} iterations reached; accept or download the current draft")]
    RefinementLimitExceeded { limit: u32 },

    #[error("Feedback targets draft version {submitted}, but the current draft is version {current}")]
    StaleDraft { submitted: u32, current: u32 },

    #[error("Cannot {action} while the run is {state}")]
    InvalidState { action: &'static str, state: &'static str },

    #[error("Run {0} not found")]
    RunNotFound(Uuid),

    #[error("Run was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Machine-readable code carried in run status and error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::IncompleteInput(_) => "INCOMPLETE_INPUT",
            PipelineError::ContextTooLarge { .. } => "CONTEXT_TOO_LARGE",
            PipelineError::MissingStageInput { .. } => "MISSING_STAGE_INPUT",
            PipelineError::StageOutputInvalid { .. } => "STAGE_OUTPUT_INVALID",
            PipelineError::ServiceUnavailable { .. } => "GENERATION_UNAVAILABLE",
            PipelineError::ServiceRejected { .. } => "GENERATION_REJECTED",
            PipelineError::RefinementLimitExceeded { .. } => "REFINEMENT_LIMIT_EXCEEDED",
            PipelineError::StaleDraft { .. } => "STALE_DRAFT",
            PipelineError::InvalidState { .. } => "INVALID_STATE",
            PipelineError::RunNotFound(_) => "RUN_NOT_FOUND",
            PipelineError::Cancelled => "CANCELLED",
        }
    }

    /// The stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            PipelineError::ContextTooLarge { stage, .. }
            | PipelineError::MissingStageInput { stage, .. }
            | PipelineError::StageOutputInvalid { stage, .. }
            | PipelineError::ServiceUnavailable { stage, .. }
            | PipelineError::ServiceRejected { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True when the error terminates the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ContextTooLarge { .. }
                | PipelineError::MissingStageInput { .. }
                | PipelineError::StageOutputInvalid { .. }
                | PipelineError::ServiceUnavailable { .. }
                | PipelineError::ServiceRejected { .. }
        )
    }
}
