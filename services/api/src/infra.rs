use loan_origination::config::{AssistantConfig, OriginationConfig};
use loan_origination::error::AppError;
use loan_origination::workflows::origination::{
    ChatCompletionsAssistant, PgLoanStore, SimulatedBureau,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store_backend: StoreBackend,
}

/// Which `LoanStore` implementation the running service was wired with.
#[derive(Clone)]
pub(crate) enum StoreBackend {
    Memory,
    Postgres(Arc<PgLoanStore>),
}

impl StoreBackend {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Postgres(_) => "postgres",
        }
    }

    /// Whether the backing store answers right now; the in-memory store always does.
    pub(crate) async fn reachable(&self) -> bool {
        match self {
            StoreBackend::Memory => true,
            StoreBackend::Postgres(store) => match store.health_check().await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(error = %err, "postgres health check failed");
                    false
                }
            },
        }
    }
}

pub(crate) fn build_assistant(config: &AssistantConfig) -> Result<ChatCompletionsAssistant, AppError> {
    let assistant = ChatCompletionsAssistant::from_config(config)?;
    if !assistant.has_credentials() {
        tracing::warn!("ASSISTANT_API_KEY not set; replies will use canned text");
    }
    Ok(assistant)
}

/// Seeded bureau when `BUREAU_SEED` is configured, entropy otherwise.
pub(crate) fn build_bureau(config: &OriginationConfig) -> SimulatedBureau {
    match config.bureau_seed {
        Some(seed) => SimulatedBureau::seeded(seed),
        None => SimulatedBureau::from_entropy(),
    }
}
