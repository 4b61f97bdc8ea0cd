use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::posting::JobPosting;
use crate::retrieval::documents::{index_job_application, IndexReport};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndexPostingRequest {
    /// Stable id for the application; generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
    pub posting: JobPosting,
}

#[derive(Debug, Serialize)]
pub struct IndexPostingResponse {
    pub job_id: String,
    #[serde(flatten)]
    pub report: IndexReport,
}

/// POST /api/v1/retrieval/postings
pub async fn handle_index_posting(
    State(state): State<AppState>,
    Json(req): Json<IndexPostingRequest>,
) -> Result<(StatusCode, Json<IndexPostingResponse>), AppError> {
    let job_id = resolve_job_id(req.job_id)?;
    let report = index_job_application(state.retrieval.as_ref(), &job_id, &req.posting).await?;
    Ok((StatusCode::CREATED, Json(IndexPostingResponse { job_id, report })))
}

/// POST /api/v1/retrieval/postings/pdf
///
/// Multipart fields: `file` (the posting as PDF, required), `job_id`, `title`,
/// `company_name` (optional).
pub async fn handle_index_posting_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IndexPostingResponse>), AppError> {
    let mut pdf: Option<Vec<u8>> = None;
    let mut job_id = None;
    let mut posting = JobPosting::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                pdf = Some(bytes.to_vec());
            }
            "job_id" | "title" | "company_name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                match name.as_str() {
                    "job_id" => job_id = value,
                    "title" => posting.title = value,
                    _ => posting.company_name = value,
                }
            }
            _ => {}
        }
    }

    let pdf = pdf.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;
    let size = pdf.len();
    posting.description = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in PDF extraction: {e}")))?
        .map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))?;
    info!(
        "Extracted {} chars from uploaded posting PDF ({size} bytes)",
        posting.description.len()
    );

    let job_id = resolve_job_id(job_id)?;
    let report = index_job_application(state.retrieval.as_ref(), &job_id, &posting).await?;
    Ok((StatusCode::CREATED, Json(IndexPostingResponse { job_id, report })))
}

fn resolve_job_id(job_id: Option<String>) -> Result<String, AppError> {
    match job_id.map(|id| id.trim().to_string()) {
        None => Ok(Uuid::new_v4().to_string()),
        Some(id) if id.is_empty() => Ok(Uuid::new_v4().to_string()),
        Some(id) if id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') => Ok(id),
        Some(id) => Err(AppError::Validation(format!(
            "job_id '{id}' may only contain letters, digits, '-' and '_'"
        ))),
    }
}
