use crate::cli::ServeArgs;
use crate::infra::{build_assistant, build_bureau, AppState, StoreBackend};
use crate::routes::with_loan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_origination::config::AppConfig;
use loan_origination::error::AppError;
use loan_origination::telemetry;
use loan_origination::workflows::origination::{
    InMemoryLoanStore, LoanChatService, LoanStore, PgLoanStore,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.database.url.clone() {
        Some(url) => {
            let store = Arc::new(PgLoanStore::connect(&url, config.database.max_connections).await?);
            store.migrate().await?;
            info!("postgres store connected and migrated");
            serve_with_store(config, store.clone(), StoreBackend::Postgres(store)).await
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            let store = Arc::new(InMemoryLoanStore::default());
            serve_with_store(config, store, StoreBackend::Memory).await
        }
    }
}

async fn serve_with_store<S>(
    config: AppConfig,
    store: Arc<S>,
    backend: StoreBackend,
) -> Result<(), AppError>
where
    S: LoanStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let store_label = backend.label();
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        store_backend: backend,
    };

    let assistant = Arc::new(build_assistant(&config.assistant)?);
    let bureau = Arc::new(build_bureau(&config.origination));
    let loan_service = Arc::new(LoanChatService::new(
        store,
        assistant,
        bureau,
        config.origination.pipeline(),
    ));

    let app = with_loan_routes(loan_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        store = store_label,
        "loan origination desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
