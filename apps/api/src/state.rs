use std::sync::Arc;

use crate::config::Config;
use crate::diagnostics::DiagnosticObserver;
use crate::llm_client::CompletionModel;
use crate::patching::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Language model behind the proposal endpoints. Production: `LlmClient`.
    pub model: Arc<dyn CompletionModel>,
    /// Receives recoverable-failure events from the pipeline and the proposal parser.
    pub observer: Arc<dyn DiagnosticObserver>,
    pub orchestrator: Orchestrator,
    pub config: Config,
}
