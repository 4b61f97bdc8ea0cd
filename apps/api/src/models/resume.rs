use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A finished resume as recorded in `resume_exports` when a run is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeExportRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub candidate_name: String,
    pub company_name: Option<String>,
    pub draft_version: i32,
    pub refinements: i32,
    pub markdown: String,
    pub s3_key: String,
    pub created_at: DateTime<Utc>,
}
