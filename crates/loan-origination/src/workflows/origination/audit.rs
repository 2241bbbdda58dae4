use std::io;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::domain::{AgentType, ApplicationId, AuditLog, Details};

impl AuditLog {
    /// Build the immutable row appended for a pipeline event.
    pub fn record(
        application_id: Option<ApplicationId>,
        action: impl Into<String>,
        agent_type: AgentType,
        details: Details,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            action: action.into(),
            agent_type,
            details,
            created_at: at,
        }
    }
}

/// Flatten a JSON value into an audit payload; scalars land under `value`.
pub fn details_of(value: Value) -> Details {
    match value {
        Value::Object(map) => map,
        Value::Null => Details::new(),
        other => {
            let mut details = Details::new();
            details.insert("value".to_string(), other);
            details
        }
    }
}

/// Serialize a typed payload (credit report, underwriting outcome) into audit details.
pub fn details_from<T: Serialize>(payload: &T) -> Details {
    match serde_json::to_value(payload) {
        Ok(value) => details_of(value),
        Err(err) => {
            tracing::warn!(error = %err, "audit payload could not be serialized");
            Details::new()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("audit details could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub const AUDIT_CSV_HEADER: [&str; 6] = [
    "id",
    "application_id",
    "action",
    "agent_type",
    "created_at",
    "details",
];

/// Write the audit trail as CSV with details encoded as compact JSON.
pub fn write_csv<W: io::Write>(entries: &[AuditLog], writer: W) -> Result<(), AuditExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(AUDIT_CSV_HEADER)?;

    for entry in entries {
        let application_id = entry
            .application_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let details = serde_json::to_string(&entry.details)?;
        csv.write_record([
            entry.id.to_string().as_str(),
            application_id.as_str(),
            entry.action.as_str(),
            entry.agent_type.label(),
            entry
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_str(),
            details.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
