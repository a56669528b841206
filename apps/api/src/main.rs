mod config;
mod diagnostics;
mod document;
mod errors;
mod layout;
mod llm_client;
mod models;
mod patching;
mod proposals;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::diagnostics::TracingObserver;
use crate::document::PdfTextExtractor;
use crate::llm_client::LlmClient;
use crate::patching::{Orchestrator, PipelineConfig};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Refit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Diagnostic events from the pipeline go to tracing
    let observer = Arc::new(TracingObserver);

    let pipeline = PipelineConfig::default();
    info!(
        "Pipeline config: estimator {}pt/{}pt lines, reflow margin {}pt",
        pipeline.estimator.font_size, pipeline.estimator.line_height, pipeline.reflow.margin
    );
    let orchestrator = Orchestrator::new(Arc::new(PdfTextExtractor), observer.clone(), pipeline);

    // Build app state
    let state = AppState {
        model: Arc::new(llm),
        observer,
        orchestrator,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
