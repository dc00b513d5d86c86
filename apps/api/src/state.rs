use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::CaptionModel;

/// Shared application state injected into all route handlers via Axum extractors.
/// Read-only after startup; nothing here is mutated per request.
#[derive(Clone)]
pub struct AppState {
    /// Vision model behind a trait object. Default: `LlmClient`.
    pub model: Arc<dyn CaptionModel>,
    pub config: Config,
}
