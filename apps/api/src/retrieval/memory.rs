//! In-process retrieval store backed by a hash map and cosine similarity.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::retrieval::embedding::{cosine_similarity, Embedder, HashingEmbedder};
use crate::retrieval::{
    IndexOutcome, RetrievalError, RetrievalStore, RetrievedDocument, SourceDocument,
};

struct StoredDocument {
    document: SourceDocument,
    embedding: Vec<f32>,
    /// Monotonic insertion sequence; larger is more recent.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, StoredDocument>,
    next_seq: u64,
}

pub struct InMemoryRetrievalStore {
    embedder: Arc<dyn Embedder>,
    inner: RwLock<Inner>,
}

impl InMemoryRetrievalStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Adds an already-embedded document.
    ///
    /// Identical text under an existing source id is a no-op and keeps the original
    /// recency. Different text replaces the stored document and counts as a fresh write.
    pub async fn insert(&self, document: SourceDocument, embedding: Vec<f32>) -> IndexOutcome {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.documents.get(&document.source_id) {
            if existing.document.text == document.text && existing.document.kind == document.kind
            {
                return IndexOutcome::Unchanged;
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let previous = inner.documents.insert(
            document.source_id.clone(),
            StoredDocument {
                document,
                embedding,
                seq,
            },
        );

        if previous.is_some() {
            IndexOutcome::Replaced
        } else {
            IndexOutcome::Inserted
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.documents.len()
    }
}

impl Default for InMemoryRetrievalStore {
    fn default() -> Self {
        Self::new(Arc::new(HashingEmbedder::default()))
    }
}

#[async_trait]
impl RetrievalStore for InMemoryRetrievalStore {
    async fn index(&self, document: SourceDocument) -> Result<IndexOutcome, RetrievalError> {
        if document.source_id.trim().is_empty() {
            return Err(RetrievalError::InvalidDocument(
                "source_id cannot be empty".to_string(),
            ));
        }
        let source_id = document.source_id.clone();
        let embedding = self.embedder.embed(&document.text);
        let outcome = self.insert(document, embedding).await;
        debug!(
            "Indexed {source_id}: {outcome:?} ({} documents in store)",
            self.len().await
        );
        Ok(outcome)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(text);
        let inner = self.inner.read().await;

        let mut scored: Vec<(f32, u64, &SourceDocument)> = inner
            .documents
            .values()
            .map(|stored| {
                (
                    cosine_similarity(&query_embedding, &stored.embedding),
                    stored.seq,
                    &stored.document,
                )
            })
            // Zero similarity means no shared vocabulary at all.
            .filter(|(score, _, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.1.cmp(&a.1))
        });
        scored.truncate(k);

        debug!("Retrieval query matched {} documents (k={k})", scored.len());

        Ok(scored
            .into_iter()
            .map(|(score, _, doc)| RetrievedDocument {
                source_id: doc.source_id.clone(),
                text: doc.text.clone(),
                score,
                kind: doc.kind,
            })
            .collect())
    }
}
