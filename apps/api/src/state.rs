use std::sync::Arc;

use crate::output::export::DraftExporter;
use crate::output::render::PdfRenderer;
use crate::pipeline::{Orchestrator, RunRegistry};
use crate::retrieval::RetrievalStore;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external collaborator sits behind a trait object so the router can be
/// exercised with stubs.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub runs: Arc<RunRegistry>,
    /// The only state shared between runs. Written only by the indexing endpoints.
    pub retrieval: Arc<dyn RetrievalStore>,
    pub renderer: Arc<dyn PdfRenderer>,
    pub exporter: Arc<dyn DraftExporter>,
}
