// Retrieval Store: past postings and company profiles, queried by similarity.
// The store is process-wide shared state injected through AppState; nothing in a
// generation run writes to it. Writes only happen through the indexing endpoints.

pub mod chunking;
pub mod documents;
pub mod embedding;
pub mod handlers;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpRetrievalStore;
pub use memory::InMemoryRetrievalStore;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backend could not be reached or answered with garbage.
    /// Callers in the pipeline degrade to an empty retrieval set on this error.
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    JobPosting,
    CompanyProfile,
}

/// A document submitted for indexing. `source_id` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: String,
    pub text: String,
    pub kind: DocumentKind,
}

/// A query hit. Read-only; hits come back ranked by descending `score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub source_id: String,
    pub text: String,
    pub score: f32,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    Inserted,
    /// Same source id, different content: the newer write survives.
    Replaced,
    /// Identical content and source id were already indexed.
    Unchanged,
}

/// The retrieval contract the pipeline depends on.
///
/// - `index` is idempotent on identical (content, source id) and safe under
///   concurrent calls from several runs.
/// - `query` returns at most `k` hits, descending similarity, ties broken by
///   most-recently-indexed first.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    async fn index(&self, document: SourceDocument) -> Result<IndexOutcome, RetrievalError>;

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError>;
}
