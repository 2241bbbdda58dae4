use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::assistant::Assistant;
use super::bureau::VerificationBureau;
use super::dispatcher::{DispatchError, LoanChatService};
use super::domain::{ApplicationId, SessionId};
use super::repository::{LoanStore, StoreError};

/// Router exposing the chat dispatcher and the read endpoints.
pub fn loan_router<S, A, B>(service: Arc<LoanChatService<S, A, B>>) -> Router
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    Router::new()
        .route("/api/v1/loan-chat", post(chat_handler::<S, A, B>))
        .route(
            "/api/v1/loan/applications/:application_id",
            get(application_handler::<S, A, B>),
        )
        .route(
            "/api/v1/loan/applications/:application_id/sanction-letter",
            get(sanction_letter_handler::<S, A, B>),
        )
        .route(
            "/api/v1/loan/sessions/:session_id/messages",
            get(transcript_handler::<S, A, B>),
        )
        .with_state(service)
}

pub(crate) async fn chat_handler<S, A, B>(
    State(service): State<Arc<LoanChatService<S, A, B>>>,
    payload: Result<axum::Json<Value>, JsonRejection>,
) -> Response
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    let payload = match payload {
        Ok(axum::Json(payload)) => payload,
        Err(rejection) => {
            return error_response(DispatchError::InvalidRequest(rejection.body_text()))
        }
    };
    match service.dispatch(payload).await {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn application_handler<S, A, B>(
    State(service): State<Arc<LoanChatService<S, A, B>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.application_view(&id).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sanction_letter_handler<S, A, B>(
    State(service): State<Arc<LoanChatService<S, A, B>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.sanction_letter(&id).await {
        Ok(letter) => (StatusCode::OK, axum::Json(letter)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transcript_handler<S, A, B>(
    State(service): State<Arc<LoanChatService<S, A, B>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    let session = SessionId(session_id);
    match service.transcript(&session).await {
        Ok(messages) => {
            let payload = json!({
                "sessionId": session.as_str(),
                "messages": messages,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn parse_application_id(raw: &str) -> Result<ApplicationId, Response> {
    Uuid::parse_str(raw).map(ApplicationId).map_err(|_| {
        let payload = json!({
            "error": format!("invalid application id: {raw}"),
        });
        (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
    })
}

/// HTTP status for each dispatcher failure.
pub fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::UnknownAction(_) | DispatchError::InvalidRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        DispatchError::ApplicationNotFound(_)
        | DispatchError::SanctionLetterUnavailable { .. }
        | DispatchError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        DispatchError::Lifecycle(_)
        | DispatchError::Store(StoreError::Conflict)
        | DispatchError::Store(StoreError::StatusConflict { .. })
        | DispatchError::Store(StoreError::StaleRecord(_)) => StatusCode::CONFLICT,
        DispatchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: DispatchError) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "loan request failed");
    }
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
