use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::domain::{
    ApplicationId, AuditLog, ChatMessage, KycDocument, LoanApplication, SessionId,
};
use super::repository::{ApplicationWrite, Changeset, LoanStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    applications: HashMap<ApplicationId, LoanApplication>,
    documents: Vec<KycDocument>,
    audit_logs: Vec<AuditLog>,
    messages: Vec<ChatMessage>,
}

/// Process-local store used by the demo CLI, the server when no database is configured, and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLoanStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryLoanStore {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".to_string()))
    }

    /// Total audit rows across all applications, including pre-application events.
    pub fn audit_len(&self) -> usize {
        self.lock().map(|tables| tables.audit_logs.len()).unwrap_or(0)
    }

    pub fn application_count(&self) -> usize {
        self.lock()
            .map(|tables| tables.applications.len())
            .unwrap_or(0)
    }

    pub fn all_audit_logs(&self) -> Vec<AuditLog> {
        self.lock()
            .map(|tables| tables.audit_logs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LoanStore for InMemoryLoanStore {
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        let mut tables = self.lock()?;

        // Check every precondition before touching any table.
        match &changeset.application {
            Some(ApplicationWrite::Create(record)) => {
                if tables.applications.contains_key(&record.id) {
                    return Err(StoreError::Conflict);
                }
            }
            Some(ApplicationWrite::Update {
                expected,
                observed_at,
                record,
            }) => {
                let current = tables
                    .applications
                    .get(&record.id)
                    .ok_or(StoreError::NotFound)?;
                if current.status != *expected {
                    return Err(StoreError::StatusConflict {
                        expected: *expected,
                        found: current.status,
                    });
                }
                if current.updated_at != *observed_at {
                    return Err(StoreError::StaleRecord(record.id));
                }
            }
            None => {}
        }

        if let Some(document) = &changeset.document {
            let owner_exists = tables.applications.contains_key(&document.application_id)
                || matches!(
                    &changeset.application,
                    Some(write) if write.record().id == document.application_id
                );
            if !owner_exists {
                return Err(StoreError::NotFound);
            }
        }

        let Changeset {
            application,
            document,
            audit,
            messages,
        } = changeset;

        if let Some(write) = application {
            let record = match write {
                ApplicationWrite::Create(record) => record,
                ApplicationWrite::Update { record, .. } => record,
            };
            tables.applications.insert(record.id, record);
        }
        if let Some(document) = document {
            tables.documents.push(document);
        }
        tables.audit_logs.extend(audit);
        tables.messages.extend(messages);
        Ok(())
    }

    async fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.applications.get(id).cloned())
    }

    async fn documents(&self, id: &ApplicationId) -> Result<Vec<KycDocument>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .documents
            .iter()
            .filter(|document| document.application_id == *id)
            .cloned()
            .collect())
    }

    async fn audit_trail(&self, id: &ApplicationId) -> Result<Vec<AuditLog>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .filter(|entry| entry.application_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    async fn session_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .messages
            .iter()
            .filter(|message| message.session_id == *session)
            .cloned()
            .collect())
    }
}
