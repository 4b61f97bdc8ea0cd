//! Export of accepted drafts: Markdown to S3, one row per export in Postgres.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::resume::ResumeExportRow;
use crate::pipeline::stage::ResumeDraft;

/// Everything recorded about an accepted draft.
#[derive(Debug, Clone, Copy)]
pub struct DraftExport<'a> {
    pub run_id: Uuid,
    pub company_name: Option<&'a str>,
    pub refinements: u32,
    pub draft: &'a ResumeDraft,
    pub markdown: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReceipt {
    pub export_id: Uuid,
    pub s3_key: String,
}

#[async_trait]
pub trait DraftExporter: Send + Sync {
    async fn export(&self, export: DraftExport<'_>) -> anyhow::Result<ExportReceipt>;
}

pub fn export_key(run_id: Uuid, version: u32) -> String {
    format!("resumes/{run_id}/v{version}.md")
}

pub struct S3Exporter {
    s3: S3Client,
    bucket: String,
    db: PgPool,
}

impl S3Exporter {
    pub fn new(s3: S3Client, bucket: impl Into<String>, db: PgPool) -> Self {
        Self {
            s3,
            bucket: bucket.into(),
            db,
        }
    }
}

#[async_trait]
impl DraftExporter for S3Exporter {
    async fn export(&self, export: DraftExport<'_>) -> anyhow::Result<ExportReceipt> {
        let s3_key = export_key(export.run_id, export.draft.version);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .body(ByteStream::from(export.markdown.as_bytes().to_vec()))
            .content_type("text/markdown")
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("S3 upload failed: {e}"))?;

        info!("Uploaded resume to s3://{}/{}", self.bucket, s3_key);

        let row = sqlx::query_as::<_, ResumeExportRow>(
            "INSERT INTO resume_exports
                (id, run_id, candidate_name, company_name, draft_version, refinements, markdown, s3_key)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id, run_id, candidate_name, company_name, draft_version, refinements,
                       markdown, s3_key, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(export.run_id)
        .bind(&export.draft.candidate_name)
        .bind(export.company_name)
        .bind(export.draft.version as i32)
        .bind(export.refinements as i32)
        .bind(export.markdown)
        .bind(&s3_key)
        .fetch_one(&self.db)
        .await?;

        info!(
            "Recorded export {} for run {} (v{}, {} refinements)",
            row.id, row.run_id, row.draft_version, row.refinements
        );
        Ok(ExportReceipt {
            export_id: row.id,
            s3_key: row.s3_key,
        })
    }
}
