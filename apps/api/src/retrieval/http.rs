//! Remote retrieval backend speaking a small JSON contract:
//!
//! - `POST {base}/documents` with a `SourceDocument` → `{"outcome": "inserted" | "replaced" | "unchanged"}`
//! - `POST {base}/query` with `{"text", "k"}` → `{"hits": [RetrievedDocument, ...]}`
//!
//! Every transport failure, timeout or non-2xx status is `RetrievalError::Unavailable`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::retrieval::{
    IndexOutcome, RetrievalError, RetrievalStore, RetrievedDocument, SourceDocument,
};

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    hits: Vec<RetrievedDocument>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    outcome: IndexOutcome,
}

#[derive(Clone)]
pub struct HttpRetrievalStore {
    client: Client,
    base_url: String,
}

impl HttpRetrievalStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, RetrievalError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Unavailable(format!(
                "POST {url} returned {status}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("malformed response from {url}: {e}")))
    }
}

#[async_trait]
impl RetrievalStore for HttpRetrievalStore {
    async fn index(&self, document: SourceDocument) -> Result<IndexOutcome, RetrievalError> {
        let response: IndexResponse = self.post("/documents", &document).await?;
        Ok(response.outcome)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let response: QueryResponse = self.post("/query", &QueryRequest { text, k }).await?;

        // The backend owns ranking; enforce only the ordering and size contract.
        // Stable sort keeps the backend's recency order among equal scores.
        let mut hits = response.hits;
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }
}
