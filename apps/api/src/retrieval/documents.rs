//! Document manager: turns a job application into indexed, chunked documents.

use serde::Serialize;
use tracing::info;

use crate::models::posting::JobPosting;
use crate::retrieval::chunking::{split_text, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::retrieval::{DocumentKind, IndexOutcome, RetrievalError, RetrievalStore, SourceDocument};

#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexReport {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub source_ids: Vec<String>,
}

impl IndexReport {
    fn record(&mut self, source_id: String, outcome: IndexOutcome) {
        match outcome {
            IndexOutcome::Inserted => self.inserted += 1,
            IndexOutcome::Replaced => self.replaced += 1,
            IndexOutcome::Unchanged => self.unchanged += 1,
        }
        self.source_ids.push(source_id);
    }
}

/// Builds the documents for a job application without touching the store.
///
/// The posting description is chunked under `{job_id}_{i}`. When a company name is
/// present, the company profile is chunked under `{company_slug}_{i}`, so the same
/// company indexed from several postings converges on one set of documents.
pub fn job_application_documents(job_id: &str, posting: &JobPosting) -> Vec<SourceDocument> {
    let mut documents: Vec<SourceDocument> =
        split_text(&posting.to_prompt_text(), CHUNK_SIZE, CHUNK_OVERLAP)
            .into_iter()
            .enumerate()
            .map(|(i, text)| SourceDocument {
                source_id: format!("{job_id}_{i}"),
                text,
                kind: DocumentKind::JobPosting,
            })
            .collect();

    if posting.company_name.is_some() {
        let slug = posting.company_slug();
        documents.extend(
            split_text(&posting.company_profile_text(), CHUNK_SIZE, CHUNK_OVERLAP)
                .into_iter()
                .enumerate()
                .map(|(i, text)| SourceDocument {
                    source_id: format!("{slug}_{i}"),
                    text,
                    kind: DocumentKind::CompanyProfile,
                }),
        );
    }

    documents
}

/// Indexes a job application. Stops at the first store error.
pub async fn index_job_application(
    store: &dyn RetrievalStore,
    job_id: &str,
    posting: &JobPosting,
) -> Result<IndexReport, RetrievalError> {
    if posting.description.trim().is_empty() {
        return Err(RetrievalError::InvalidDocument(
            "posting description cannot be empty".to_string(),
        ));
    }

    let mut report = IndexReport::default();
    for document in job_application_documents(job_id, posting) {
        let source_id = document.source_id.clone();
        let outcome = store.index(document).await?;
        report.record(source_id, outcome);
    }

    info!(
        "Indexed job application {job_id}: {} inserted, {} replaced, {} unchanged",
        report.inserted, report.replaced, report.unchanged
    );
    Ok(report)
}
