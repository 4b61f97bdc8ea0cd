//! PDF rendering is an external, pure function: structured resume in, bytes out.
//! A render failure never affects the run; the Markdown stays downloadable.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::output::markdown::file_stem;
use crate::pipeline::stage::ResumeDraft;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF rendering is not configured")]
    Disabled,

    #[error("PDF renderer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, draft: &ResumeDraft, markdown: &str) -> Result<Bytes, RenderError>;
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    file_name: String,
    markdown: &'a str,
    draft: &'a ResumeDraft,
}

/// Renderer service reached at `POST {base}/render`, answering with the PDF body.
#[derive(Clone)]
pub struct HttpPdfRenderer {
    client: Client,
    base_url: String,
}

impl HttpPdfRenderer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, draft: &ResumeDraft, markdown: &str) -> Result<Bytes, RenderError> {
        let url = format!("{}/render", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RenderRequest {
                file_name: format!("{}.pdf", file_stem(draft)),
                markdown,
                draft,
            })
            .send()
            .await
            .map_err(|e| RenderError::Unavailable(format!("POST {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Unavailable(format!(
                "POST {url} returned {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RenderError::Unavailable(format!("reading PDF body: {e}")))?;
        if body.is_empty() {
            return Err(RenderError::Unavailable("renderer returned an empty document".to_string()));
        }
        Ok(body)
    }
}

/// Used when no renderer is configured.
pub struct DisabledRenderer;

#[async_trait]
impl PdfRenderer for DisabledRenderer {
    async fn render(&self, _draft: &ResumeDraft, _markdown: &str) -> Result<Bytes, RenderError> {
        Err(RenderError::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stage::DraftContent;
    use uuid::Uuid;

    fn draft() -> ResumeDraft {
        ResumeDraft::from_content(
            DraftContent {
                sections: vec![],
                skills_referenced: vec![],
                change_summary: None,
            },
            1,
            "Jane Doe",
            String::new(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn test_disabled_renderer_always_fails() {
        let err = DisabledRenderer.render(&draft(), "# Jane Doe").await.unwrap_err();
        assert!(matches!(err, RenderError::Disabled));
    }

    #[tokio::test]
    async fn test_unreachable_renderer_is_unavailable() {
        let renderer = HttpPdfRenderer::new("http://127.0.0.1:9", Duration::from_millis(500));
        let err = renderer.render(&draft(), "# Jane Doe").await.unwrap_err();
        assert!(matches!(err, RenderError::Unavailable(_)));
    }
}
