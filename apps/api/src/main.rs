mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod output;
mod pipeline;
mod retrieval;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::output::export::S3Exporter;
use crate::output::render::{DisabledRenderer, HttpPdfRenderer, PdfRenderer};
use crate::pipeline::context::ContextAssembler;
use crate::pipeline::retry::StageRunner;
use crate::pipeline::{Orchestrator, OrchestratorSettings, RunRegistry};
use crate::retrieval::{HttpRetrievalStore, InMemoryRetrievalStore, RetrievalStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (export records only)
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");
    let exporter = Arc::new(S3Exporter::new(s3, config.s3_bucket.clone(), db));

    // Initialize generation service
    let retry = config.pipeline.retry.clone();
    let llm = LlmClient::new(config.anthropic_api_key.clone(), retry.call_timeout);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Retrieval backend: remote if configured, otherwise in-process
    let retrieval: Arc<dyn RetrievalStore> = match &config.retrieval_url {
        Some(url) => {
            info!("Retrieval backend: {url}");
            Arc::new(HttpRetrievalStore::new(url.clone(), retry.call_timeout))
        }
        None => {
            info!("Retrieval backend: in-process store");
            Arc::new(InMemoryRetrievalStore::default())
        }
    };

    let renderer: Arc<dyn PdfRenderer> = match &config.render_url {
        Some(url) => {
            info!("PDF renderer: {url}");
            Arc::new(HttpPdfRenderer::new(url.clone(), retry.call_timeout))
        }
        None => {
            info!("PDF renderer not configured; only Markdown output is available");
            Arc::new(DisabledRenderer)
        }
    };

    match config.pipeline.max_refinements {
        Some(limit) => info!("Refinements capped at {limit} per run"),
        None => info!("Refinements are unbounded"),
    }

    let orchestrator = Orchestrator::new(
        StageRunner::new(Arc::new(llm), retry.clone()),
        ContextAssembler::new(config.pipeline.context_budget_chars),
        retrieval.clone(),
        OrchestratorSettings {
            retrieval_top_k: config.pipeline.retrieval_top_k,
            retrieval_timeout: retry.call_timeout,
            max_refinements: config.pipeline.max_refinements,
        },
    );

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        runs: Arc::new(RunRegistry::new()),
        retrieval,
        renderer,
        exporter,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "tailor-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
