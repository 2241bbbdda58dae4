use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, AuditLog, ChatMessage, KycDocument, LoanApplication, LoanStatus, SessionId,
};

/// Write to the application row carried by a changeset.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationWrite {
    Create(LoanApplication),
    /// Replace the row only if its stored status still equals `expected` and its
    /// `updated_at` still equals `observed_at`, the value the writer read.
    Update {
        expected: LoanStatus,
        observed_at: DateTime<Utc>,
        record: LoanApplication,
    },
}

impl ApplicationWrite {
    pub fn record(&self) -> &LoanApplication {
        match self {
            ApplicationWrite::Create(record) => record,
            ApplicationWrite::Update { record, .. } => record,
        }
    }
}

/// Every write produced by one dispatcher action. Stores apply it all or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub application: Option<ApplicationWrite>,
    pub document: Option<KycDocument>,
    pub audit: Vec<AuditLog>,
    pub messages: Vec<ChatMessage>,
}

/// Relational store holding applications, KYC documents, audit logs and transcripts.
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Apply a changeset atomically, honouring the expected-status and `updated_at` precondition.
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError>;

    async fn application(&self, id: &ApplicationId)
        -> Result<Option<LoanApplication>, StoreError>;

    /// Every upload for the application, oldest first.
    async fn documents(&self, id: &ApplicationId) -> Result<Vec<KycDocument>, StoreError>;

    /// Audit rows for the application, newest first.
    async fn audit_trail(&self, id: &ApplicationId) -> Result<Vec<AuditLog>, StoreError>;

    /// Transcript for a session, oldest first.
    async fn session_messages(&self, session: &SessionId)
        -> Result<Vec<ChatMessage>, StoreError>;

    async fn append_audit(&self, entry: AuditLog) -> Result<(), StoreError> {
        self.commit(Changeset {
            audit: vec![entry],
            ..Changeset::default()
        })
        .await
    }
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("application status changed concurrently (expected {expected}, found {found})")]
    StatusConflict {
        expected: LoanStatus,
        found: LoanStatus,
    },
    #[error("application {0} was modified by another request")]
    StaleRecord(ApplicationId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}
