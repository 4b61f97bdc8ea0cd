use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::output::markdown::{file_stem, to_markdown};
use crate::pipeline::handlers::find_run;
use crate::pipeline::stage::ResumeDraft;
use crate::state::AppState;

/// GET /api/v1/runs/:id/markdown
///
/// The final draft of a completed run, otherwise the current intermediate draft.
pub async fn handle_markdown(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let draft = current_draft(&state, run_id).await?;
    let disposition = format!("attachment; filename=\"{}.md\"", file_stem(&draft));

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        to_markdown(&draft),
    )
        .into_response())
}

/// GET /api/v1/runs/:id/pdf
pub async fn handle_pdf(
    State(state): State<AppState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let draft = current_draft(&state, run_id).await?;
    let markdown = to_markdown(&draft);
    let pdf = state.renderer.render(&draft, &markdown).await?;
    let disposition = format!("attachment; filename=\"{}.pdf\"", file_stem(&draft));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

/// Taken from the published snapshot; never waits on an in-flight stage.
async fn current_draft(state: &AppState, run_id: Uuid) -> Result<ResumeDraft, AppError> {
    let handle = find_run(state, run_id).await?;
    let draft = handle.status.borrow().draft.clone();
    draft.ok_or_else(|| AppError::NotFound(format!("Run {run_id} has no draft yet")))
}
