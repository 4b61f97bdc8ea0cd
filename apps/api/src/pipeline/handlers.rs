use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::output::export::{DraftExport, ExportReceipt};
use crate::output::markdown::to_markdown;
use crate::pipeline::intake::GenerationRequest;
use crate::pipeline::orchestrator::RunSnapshot;
use crate::pipeline::registry::RunHandle;
use crate::pipeline::stage::SuggestionSet;
use crate::pipeline::{PipelineError, PipelineRun, RunState};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DraftView {
    pub version: u32,
    pub markdown: String,
    pub change_summary: Option<String>,
}

/// Run status as returned by every run endpoint.
#[derive(Debug, Serialize)]
pub struct RunView {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub state: RunState,
    pub refinements: u32,
    pub max_refinements: Option<u32>,
    pub retrieval_degraded: bool,
    pub draft: Option<DraftView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunView {
    fn of(snapshot: &RunSnapshot, max_refinements: Option<u32>) -> Self {
        Self {
            run_id: snapshot.id,
            state: snapshot.state.clone(),
            refinements: snapshot.refinements,
            max_refinements,
            retrieval_degraded: snapshot.retrieval_degraded,
            draft: snapshot.draft.as_ref().map(|draft| DraftView {
                version: draft.version,
                markdown: to_markdown(draft),
                change_summary: draft.change_summary.clone(),
            }),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub draft_version: u32,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    #[serde(flatten)]
    pub run: RunView,
    pub exported: bool,
    pub export: Option<ExportReceipt>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/runs
///
/// Validates the request, then drives the run to its first `AwaitingFeedback`.
/// The stages run on a spawned task so a dropped connection cannot strand the run
/// mid-stage.
pub async fn handle_create_run(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<(StatusCode, Json<RunView>), AppError> {
    let run = PipelineRun::new(req)?;
    let run_id = run.id();
    let handle = state.runs.insert(run).await;
    info!("Run {run_id}: created ({} live runs)", state.runs.len().await);

    let orchestrator = state.orchestrator.clone();
    let RunHandle { run, cancel, .. } = handle;
    let view = tokio::spawn(async move {
        let mut run = run.lock_owned().await;
        orchestrator
            .generate(&mut run, &cancel)
            .await
            .map(|()| RunView::of(&run.snapshot(), orchestrator.max_refinements()))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("generation task failed: {e}")))?
    .map_err(|e| AppError::pipeline(run_id, e))?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/runs/:id
///
/// Reads the published snapshot, so it answers while a stage is in flight.
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<RunView>, AppError> {
    let handle = find_run(&state, run_id).await?;
    let snapshot = handle.status.borrow().clone();
    Ok(Json(RunView::of(&snapshot, state.orchestrator.max_refinements())))
}

/// POST /api/v1/runs/:id/feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<RunView>, AppError> {
    let RunHandle { run, cancel, .. } = find_run(&state, run_id).await?;
    let orchestrator = state.orchestrator.clone();

    let view = tokio::spawn(async move {
        let mut run = run.lock_owned().await;
        orchestrator
            .refine(&mut run, req.draft_version, &req.text, &cancel)
            .await
            .map(|()| RunView::of(&run.snapshot(), orchestrator.max_refinements()))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("refinement task failed: {e}")))?
    .map_err(|e| AppError::pipeline(run_id, e))?;

    Ok(Json(view))
}

/// POST /api/v1/runs/:id/accept
///
/// Completes the run, then exports the final draft. An export failure leaves the
/// run `Complete` and is reported as `exported: false`.
pub async fn handle_accept(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<AcceptResponse>, AppError> {
    let handle = find_run(&state, run_id).await?;

    let (draft, company_name, snapshot) = {
        let mut run = handle.run.lock().await;
        let company_name = run
            .context()
            .and_then(|ctx| ctx.posting().company_name.clone());
        let draft = state.orchestrator.accept(&mut run)?;
        (draft, company_name, run.snapshot())
    };
    let refinements = snapshot.refinements;
    let view = RunView::of(&snapshot, state.orchestrator.max_refinements());

    let markdown = to_markdown(&draft);
    let export = state
        .exporter
        .export(DraftExport {
            run_id,
            company_name: company_name.as_deref(),
            refinements,
            draft: &draft,
            markdown: &markdown,
        })
        .await;

    let export = match export {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            error!("Run {run_id}: export of draft v{} failed: {e:?}", draft.version);
            None
        }
    };

    Ok(Json(AcceptResponse {
        run: view,
        exported: export.is_some(),
        export,
    }))
}

/// DELETE /api/v1/runs/:id
///
/// Cancels an unfinished run; a finished one is only forgotten.
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.runs.cancel(run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/runs/:id/suggestions
///
/// Advisory only; the run stays in `AwaitingFeedback` whatever happens here. The run
/// lock is released before the generation call, and a cancelled run stops it.
pub async fn handle_suggestions(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<SuggestionSet>, AppError> {
    let RunHandle { run, cancel, .. } = find_run(&state, run_id).await?;
    let prompt = {
        let run = run.lock().await;
        state.orchestrator.suggestions_prompt(&run)?
    };
    let suggestions = state
        .orchestrator
        .suggest_improvements(&prompt, &cancel)
        .await
        .map_err(|e| match e {
            e if e.is_fatal() => AppError::Upstream {
                code: e.code(),
                message: e.to_string(),
            },
            e => AppError::from(e),
        })?;
    Ok(Json(suggestions))
}

pub(crate) async fn find_run(state: &AppState, run_id: Uuid) -> Result<RunHandle, AppError> {
    state
        .runs
        .get(run_id)
        .await
        .ok_or_else(|| AppError::from(PipelineError::RunNotFound(run_id)))
}
