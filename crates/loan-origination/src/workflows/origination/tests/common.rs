use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use crate::workflows::origination::assistant::{Assistant, AssistantError, Prompt};
use crate::workflows::origination::bureau::{
    synthetic_id_number, CreditReport, OcrExtraction, VerificationBureau,
};
use crate::workflows::origination::domain::{
    ApplicationId, AuditLog, ChatMessage, DocumentType, KycDocument, LoanApplication, SessionId,
};
use crate::workflows::origination::memory::InMemoryLoanStore;
use crate::workflows::origination::repository::{Changeset, LoanStore, StoreError};
use crate::workflows::origination::{LoanChatService, PipelineConfig};

pub(super) const SESSION: &str = "session-7f3a";
pub(super) const LETTER_BASE: &str = "http://letters.test";

/// Bureau returning a fixed score and applicant name.
pub(super) struct FixedBureau {
    score: u16,
    checks: Mutex<u32>,
}

impl FixedBureau {
    pub(super) fn scoring(score: u16) -> Self {
        Self {
            score,
            checks: Mutex::new(0),
        }
    }

    pub(super) fn credit_checks(&self) -> u32 {
        *self.checks.lock().expect("bureau mutex poisoned")
    }
}

impl VerificationBureau for FixedBureau {
    fn credit_check(&self, _applicant_name: &str) -> CreditReport {
        *self.checks.lock().expect("bureau mutex poisoned") += 1;
        CreditReport::from_score(self.score)
    }

    fn extract(&self, document_type: DocumentType) -> OcrExtraction {
        OcrExtraction {
            name: "Priya Patel".to_string(),
            id_number: synthetic_id_number(document_type).to_string(),
            dob: "15/08/1990".to_string(),
            address: "123 Main Street, Mumbai, Maharashtra 400001".to_string(),
            confidence: 91.5,
        }
    }
}

/// Assistant that echoes the agent and records every prompt it sees.
#[derive(Default)]
pub(super) struct ScriptedAssistant {
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedAssistant {
    pub(super) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().expect("assistant mutex poisoned").clone()
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn generate(&self, prompt: &Prompt) -> Result<String, AssistantError> {
        self.prompts
            .lock()
            .expect("assistant mutex poisoned")
            .push(prompt.clone());
        Ok(format!("[{}] noted", prompt.agent.label()))
    }
}

/// Assistant that always fails with the given error.
pub(super) struct FailingAssistant(pub(super) AssistantError);

#[async_trait]
impl Assistant for FailingAssistant {
    async fn generate(&self, _prompt: &Prompt) -> Result<String, AssistantError> {
        Err(self.0.clone())
    }
}

/// Store whose every call fails.
pub(super) struct UnavailableStore;

#[async_trait]
impl LoanStore for UnavailableStore {
    async fn commit(&self, _changeset: Changeset) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn documents(&self, _id: &ApplicationId) -> Result<Vec<KycDocument>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn audit_trail(&self, _id: &ApplicationId) -> Result<Vec<AuditLog>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn session_messages(
        &self,
        _session: &SessionId,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// In-memory store whose first two document reads wait for each other, so two uploads
/// observe the same document set before either commits.
pub(super) struct GatedStore {
    inner: InMemoryLoanStore,
    gate: Barrier,
    gated_reads: AtomicUsize,
}

impl GatedStore {
    pub(super) fn new() -> Self {
        Self {
            inner: InMemoryLoanStore::default(),
            gate: Barrier::new(2),
            gated_reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LoanStore for GatedStore {
    async fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        self.inner.commit(changeset).await
    }

    async fn application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<LoanApplication>, StoreError> {
        self.inner.application(id).await
    }

    async fn documents(&self, id: &ApplicationId) -> Result<Vec<KycDocument>, StoreError> {
        let documents = self.inner.documents(id).await?;
        if self.gated_reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.gate.wait().await;
        }
        Ok(documents)
    }

    async fn audit_trail(&self, id: &ApplicationId) -> Result<Vec<AuditLog>, StoreError> {
        self.inner.audit_trail(id).await
    }

    async fn session_messages(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.inner.session_messages(session).await
    }
}

pub(super) type TestService = LoanChatService<InMemoryLoanStore, ScriptedAssistant, FixedBureau>;

pub(super) fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        sanction_letter_base_url: LETTER_BASE.to_string(),
        ..PipelineConfig::default()
    }
}

pub(super) fn build_service(
    score: u16,
) -> (
    TestService,
    Arc<InMemoryLoanStore>,
    Arc<ScriptedAssistant>,
    Arc<FixedBureau>,
) {
    let store = Arc::new(InMemoryLoanStore::default());
    let assistant = Arc::new(ScriptedAssistant::default());
    let bureau = Arc::new(FixedBureau::scoring(score));
    let service = LoanChatService::new(
        store.clone(),
        assistant.clone(),
        bureau.clone(),
        pipeline_config(),
    );
    (service, store, assistant, bureau)
}

pub(super) fn init_payload() -> Value {
    json!({ "action": "init", "sessionId": SESSION })
}

pub(super) fn select_amount_payload(amount: u64, monthly_income: Option<u64>) -> Value {
    let mut payload = json!({
        "action": "select_amount",
        "sessionId": SESSION,
        "amount": amount,
    });
    if let Some(income) = monthly_income {
        payload["monthlyIncome"] = json!(income);
    }
    payload
}

pub(super) fn upload_payload(application_id: ApplicationId, document_type: &str) -> Value {
    json!({
        "action": "upload_kyc",
        "sessionId": SESSION,
        "applicationId": application_id,
        "documentType": document_type,
        "fileUrl": format!("blob://kyc/{application_id}/{document_type}.jpg"),
    })
}

pub(super) fn message_payload(application_id: Option<ApplicationId>, content: &str) -> Value {
    let mut payload = json!({
        "action": "message",
        "sessionId": SESSION,
        "content": content,
    });
    if let Some(id) = application_id {
        payload["applicationId"] = json!(id);
    }
    payload
}

/// Select an amount and return the created application id.
pub(super) async fn open_application<S, A, B>(
    service: &LoanChatService<S, A, B>,
    amount: u64,
    monthly_income: Option<u64>,
) -> ApplicationId
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    let response = service
        .dispatch(select_amount_payload(amount, monthly_income))
        .await
        .expect("select_amount succeeds");
    response.application().expect("application returned").id
}

pub(super) fn actions(entries: &[AuditLog]) -> Vec<&str> {
    entries.iter().map(|entry| entry.action.as_str()).collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
