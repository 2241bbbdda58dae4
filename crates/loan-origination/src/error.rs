use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::origination::router::status_for;
use crate::workflows::origination::{AssistantError, AuditExportError, DispatchError, StoreError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Store(StoreError),
    Assistant(AssistantError),
    Dispatch(DispatchError),
    Export(AuditExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Store(err) => write!(f, "store error: {}", err),
            AppError::Assistant(err) => write!(f, "assistant error: {}", err),
            AppError::Dispatch(err) => write!(f, "loan workflow error: {}", err),
            AppError::Export(err) => write!(f, "audit export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Assistant(err) => Some(err),
            AppError::Dispatch(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Dispatch(err) => status_for(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Store(_)
            | AppError::Assistant(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<AssistantError> for AppError {
    fn from(value: AssistantError) -> Self {
        Self::Assistant(value)
    }
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<AuditExportError> for AppError {
    fn from(value: AuditExportError) -> Self {
        Self::Export(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::origination::{ApplicationId, LoanStatus};

    #[test]
    fn dispatch_errors_keep_their_http_status() {
        let missing = AppError::from(DispatchError::ApplicationNotFound(ApplicationId::generate()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let raced = AppError::from(DispatchError::Store(StoreError::StatusConflict {
            expected: LoanStatus::KycPending,
            found: LoanStatus::Sanctioned,
        }));
        assert_eq!(raced.into_response().status(), StatusCode::CONFLICT);

        let stale = AppError::from(DispatchError::Store(StoreError::StaleRecord(
            ApplicationId::generate(),
        )));
        assert_eq!(stale.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_errors_surface_as_internal_errors() {
        let err = AppError::from(StoreError::Unavailable("offline".to_string()));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "store error: store unavailable: offline");
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
