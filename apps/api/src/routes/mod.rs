pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::output::handlers as output;
use crate::pipeline::handlers as runs;
use crate::retrieval::handlers as retrieval;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Runs
        .route("/api/v1/runs", post(runs::handle_create_run))
        .route(
            "/api/v1/runs/:id",
            get(runs::handle_get_run).delete(runs::handle_cancel),
        )
        .route(
            "/api/v1/runs/:id/feedback",
            post(runs::handle_submit_feedback),
        )
        .route("/api/v1/runs/:id/accept", post(runs::handle_accept))
        .route(
            "/api/v1/runs/:id/suggestions",
            get(runs::handle_suggestions),
        )
        // Output
        .route("/api/v1/runs/:id/markdown", get(output::handle_markdown))
        .route("/api/v1/runs/:id/pdf", get(output::handle_pdf))
        // Retrieval indexing
        .route(
            "/api/v1/retrieval/postings",
            post(retrieval::handle_index_posting),
        )
        .route(
            "/api/v1/retrieval/postings/pdf",
            post(retrieval::handle_index_posting_pdf),
        )
        .with_state(state)
}
