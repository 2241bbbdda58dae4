use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loan_origination::workflows::origination::{
    loan_router, Assistant, LoanChatService, LoanStore, VerificationBureau,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_loan_routes<S, A, B>(service: Arc<LoanChatService<S, A, B>>) -> axum::Router
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    loan_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let bound = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let (status, label) = if !bound {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    } else if !state.store_backend.reachable().await {
        (StatusCode::SERVICE_UNAVAILABLE, "store_unreachable")
    } else {
        (StatusCode::OK, "ready")
    };

    let payload = json!({
        "status": label,
        "store": state.store_backend.label(),
    });

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
