//! Single entry point behind the loan chat endpoint.
//!
//! Each action plans its application write, audit rows and transcript rows, asks the assistant
//! for a reply, then commits everything as one changeset before reading the application back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::assistant::{reply_or_fallback, Assistant, Prompt};
use super::audit::{details_from, details_of};
use super::bureau::VerificationBureau;
use super::domain::{
    latest_per_type, uploaded_document_types, AgentType, ApplicationId, AuditLog, ChatMessage,
    ChatRole, Details, DocumentType, KycDocument, LoanApplication, LoanStatus, SessionId,
    VerificationStatus,
};
use super::lifecycle::{kyc_complete, LifecycleError};
use super::repository::{ApplicationWrite, Changeset, LoanStore, StoreError};
use super::sanction::{format_inr, letter_url, SanctionLetter};
use super::underwriting::{UnderwritingConfig, UnderwritingEngine, UnderwritingOutcome};

/// Tunables for the origination pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub underwriting: UnderwritingConfig,
    pub sanction_letter_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            underwriting: UnderwritingConfig::default(),
            sanction_letter_base_url: "http://localhost:54321".to_string(),
        }
    }
}

/// Actions accepted by the dispatcher, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchRequest {
    #[serde(rename_all = "camelCase")]
    Init { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    SelectAmount {
        session_id: SessionId,
        amount: u64,
        #[serde(default)]
        monthly_income: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    UploadKyc {
        session_id: SessionId,
        application_id: ApplicationId,
        document_type: DocumentType,
        file_url: String,
    },
    #[serde(rename_all = "camelCase")]
    Message {
        session_id: SessionId,
        #[serde(default)]
        application_id: Option<ApplicationId>,
        content: String,
    },
}

impl DispatchRequest {
    pub const ACTIONS: [&'static str; 4] = ["init", "select_amount", "upload_kyc", "message"];

    /// Parse a raw request body; the `action` tag is checked before the payload shape.
    pub fn from_value(payload: Value) -> Result<Self, DispatchError> {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::InvalidRequest("missing action".to_string()))?;

        if !Self::ACTIONS.contains(&action) {
            return Err(DispatchError::UnknownAction(action.to_string()));
        }

        let request: DispatchRequest = serde_json::from_value(payload)
            .map_err(|err| DispatchError::InvalidRequest(err.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<(), DispatchError> {
        if self.session_id().as_str().trim().is_empty() {
            return Err(DispatchError::InvalidRequest(
                "sessionId must not be empty".to_string(),
            ));
        }
        if let DispatchRequest::SelectAmount {
            amount,
            monthly_income,
            ..
        } = self
        {
            check_rupees("amount", *amount)?;
            if let Some(income) = monthly_income {
                check_rupees("monthlyIncome", *income)?;
            }
        }
        Ok(())
    }

    pub fn action(&self) -> &'static str {
        match self {
            DispatchRequest::Init { .. } => "init",
            DispatchRequest::SelectAmount { .. } => "select_amount",
            DispatchRequest::UploadKyc { .. } => "upload_kyc",
            DispatchRequest::Message { .. } => "message",
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            DispatchRequest::Init { session_id }
            | DispatchRequest::SelectAmount { session_id, .. }
            | DispatchRequest::UploadKyc { session_id, .. }
            | DispatchRequest::Message { session_id, .. } => session_id,
        }
    }
}

/// Largest rupee value accepted from a client; stores persist amounts as signed 64-bit.
pub const MAX_RUPEES: u64 = i64::MAX as u64;

fn check_rupees(field: &str, value: u64) -> Result<(), DispatchError> {
    if value == 0 {
        return Err(DispatchError::InvalidRequest(format!(
            "{field} must be greater than zero"
        )));
    }
    if value > MAX_RUPEES {
        return Err(DispatchError::InvalidRequest(format!(
            "{field} must not exceed {MAX_RUPEES}"
        )));
    }
    Ok(())
}

/// Combined reply returned to the chat client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResponse {
    pub message: String,
    pub agent: AgentType,
    /// `Some(None)` serializes as `null` for a message about an unknown application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<Option<LoanApplication>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<KycDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_logs: Option<Vec<AuditLog>>,
    pub messages: Vec<ChatMessage>,
}

impl DispatchResponse {
    pub fn application(&self) -> Option<&LoanApplication> {
        self.application.as_ref().and_then(Option::as_ref)
    }
}

/// Application snapshot served by the read endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub application: LoanApplication,
    pub documents: Vec<KycDocument>,
    pub audit_logs: Vec<AuditLog>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("application {id} is {status} and has no sanction letter")]
    SanctionLetterUnavailable {
        id: ApplicationId,
        status: LoanStatus,
    },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reply and agent chosen for an upload, plus the planned writes.
struct UploadPlan {
    agent: AgentType,
    prompt: Prompt,
    audit: Vec<AuditLog>,
}

/// Service composing the store, assistant, verification bureau and underwriting engine.
pub struct LoanChatService<S, A, B> {
    store: Arc<S>,
    assistant: Arc<A>,
    bureau: Arc<B>,
    engine: UnderwritingEngine,
    sanction_letter_base_url: String,
}

impl<S, A, B> LoanChatService<S, A, B>
where
    S: LoanStore + 'static,
    A: Assistant + 'static,
    B: VerificationBureau + 'static,
{
    pub fn new(store: Arc<S>, assistant: Arc<A>, bureau: Arc<B>, config: PipelineConfig) -> Self {
        Self {
            store,
            assistant,
            bureau,
            engine: UnderwritingEngine::new(config.underwriting),
            sanction_letter_base_url: config.sanction_letter_base_url,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Parse and handle a raw JSON body.
    pub async fn dispatch(&self, payload: Value) -> Result<DispatchResponse, DispatchError> {
        let request = DispatchRequest::from_value(payload)?;
        self.handle(request).await
    }

    pub async fn handle(&self, request: DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        tracing::debug!(
            action = request.action(),
            session = %request.session_id(),
            "dispatching loan chat action"
        );

        match request {
            DispatchRequest::Init { session_id } => self.init(session_id).await,
            DispatchRequest::SelectAmount {
                session_id,
                amount,
                monthly_income,
            } => self.select_amount(session_id, amount, monthly_income).await,
            DispatchRequest::UploadKyc {
                session_id,
                application_id,
                document_type,
                file_url,
            } => {
                self.upload_kyc(session_id, application_id, document_type, file_url)
                    .await
            }
            DispatchRequest::Message {
                session_id,
                application_id,
                content,
            } => self.message(session_id, application_id, content).await,
        }
    }

    async fn init(&self, session_id: SessionId) -> Result<DispatchResponse, DispatchError> {
        let now = Utc::now();
        let prompt = Prompt::new(
            AgentType::Master,
            "A new user has arrived. Welcome them and explain that you can help with personal loan applications. Ask them to select a loan amount.",
        );
        let reply = reply_or_fallback(self.assistant.as_ref(), &prompt).await;

        let messages = vec![ChatMessage::new(
            session_id.clone(),
            None,
            ChatRole::Assistant,
            reply.clone(),
            Some(AgentType::Master),
            now,
        )];
        let audit = vec![AuditLog::record(
            None,
            "Session started",
            AgentType::Master,
            details_of(json!({ "session_id": session_id.as_str() })),
            now,
        )];

        self.commit(Changeset {
            audit,
            messages: messages.clone(),
            ..Changeset::default()
        })
        .await?;

        Ok(DispatchResponse {
            message: reply,
            agent: AgentType::Master,
            application: None,
            document: None,
            audit_logs: None,
            messages,
        })
    }

    async fn select_amount(
        &self,
        session_id: SessionId,
        amount: u64,
        monthly_income: Option<u64>,
    ) -> Result<DispatchResponse, DispatchError> {
        let now = Utc::now();
        let mut application = LoanApplication::new(amount, monthly_income, now);
        let id = application.id;

        let mut audit = vec![AuditLog::record(
            Some(id),
            "Application created",
            AgentType::Master,
            details_of(json!({ "amount": amount })),
            now,
        )];
        application.advance_to(LoanStatus::KycPending, now)?;
        audit.push(AuditLog::record(
            Some(id),
            "KYC requested",
            AgentType::Negotiation,
            details_of(json!({ "status": LoanStatus::KycPending.label() })),
            now,
        ));

        let display_amount = format_inr(amount);
        let prompt = Prompt::new(
            AgentType::Negotiation,
            format!(
                "User selected loan amount of {display_amount}. Confirm the amount and ask them to proceed with KYC document upload (PAN and Aadhaar cards)."
            ),
        );
        let reply = reply_or_fallback(self.assistant.as_ref(), &prompt).await;

        let messages = vec![
            ChatMessage::new(
                session_id.clone(),
                Some(id),
                ChatRole::User,
                format!("I'd like to borrow {display_amount}"),
                None,
                now,
            ),
            ChatMessage::new(
                session_id,
                Some(id),
                ChatRole::Assistant,
                reply.clone(),
                Some(AgentType::Negotiation),
                now,
            ),
        ];

        self.commit(Changeset {
            application: Some(ApplicationWrite::Create(application)),
            document: None,
            audit,
            messages: messages.clone(),
        })
        .await?;

        tracing::info!(application = %id, amount, "loan application created");
        let (application, audit_logs) = self.read_back(&id).await?;

        Ok(DispatchResponse {
            message: reply,
            agent: AgentType::Negotiation,
            application: Some(Some(application)),
            document: None,
            audit_logs: Some(audit_logs),
            messages,
        })
    }

    async fn upload_kyc(
        &self,
        session_id: SessionId,
        application_id: ApplicationId,
        document_type: DocumentType,
        file_url: String,
    ) -> Result<DispatchResponse, DispatchError> {
        let now = Utc::now();
        let mut application = self
            .store
            .application(&application_id)
            .await?
            .ok_or(DispatchError::ApplicationNotFound(application_id))?;
        application.ensure_accepting_uploads()?;
        let expected = application.status;
        let observed_at = application.updated_at;

        let ocr = self.bureau.extract(document_type);
        let document = KycDocument {
            id: Uuid::new_v4(),
            application_id,
            document_type,
            file_url,
            extracted_name: Some(ocr.name.clone()),
            extracted_id: Some(ocr.id_number.clone()),
            extracted_dob: Some(ocr.dob.clone()),
            extracted_address: Some(ocr.address.clone()),
            ocr_confidence: Some(ocr.confidence),
            verification_status: VerificationStatus::Verified,
            created_at: now,
        };

        let mut uploaded = uploaded_document_types(&self.store.documents(&application_id).await?);
        uploaded.insert(document_type);

        let mut audit = vec![AuditLog::record(
            Some(application_id),
            format!("{} verified via OCR", document_type.tag()),
            AgentType::Kyc,
            details_of(json!({
                "confidence": ocr.confidence,
                "document_id": document.id,
            })),
            now,
        )];

        let plan = if kyc_complete(&uploaded) {
            self.run_decision(&mut application, &ocr.name, now)?
        } else {
            application.updated_at = now;
            UploadPlan {
                agent: AgentType::Kyc,
                prompt: Prompt::new(
                    AgentType::Kyc,
                    format!(
                        "{} card verified successfully. Extracted name: {}. Ask user to upload the remaining document.",
                        document_type.tag(),
                        ocr.name
                    ),
                ),
                audit: Vec::new(),
            }
        };
        audit.extend(plan.audit);

        let reply = reply_or_fallback(self.assistant.as_ref(), &plan.prompt).await;
        let messages = vec![
            ChatMessage::new(
                session_id.clone(),
                Some(application_id),
                ChatRole::User,
                format!("Uploaded {} card", document_type.tag()),
                None,
                now,
            ),
            ChatMessage::new(
                session_id,
                Some(application_id),
                ChatRole::Assistant,
                reply.clone(),
                Some(plan.agent),
                now,
            ),
        ];

        let final_status = application.status;
        self.commit(Changeset {
            application: Some(ApplicationWrite::Update {
                expected,
                observed_at,
                record: application,
            }),
            document: Some(document.clone()),
            audit,
            messages: messages.clone(),
        })
        .await?;

        if final_status.is_decided() {
            tracing::info!(
                application = %application_id,
                status = %final_status,
                "loan decision committed"
            );
        }

        let (application, audit_logs) = self.read_back(&application_id).await?;
        Ok(DispatchResponse {
            message: reply,
            agent: plan.agent,
            application: Some(Some(application)),
            document: Some(document),
            audit_logs: Some(audit_logs),
            messages,
        })
    }

    /// Walk a KYC-complete application through verification, credit check, underwriting and,
    /// on approval, sanction. Only the final state is persisted.
    fn run_decision(
        &self,
        application: &mut LoanApplication,
        applicant_name: &str,
        now: DateTime<Utc>,
    ) -> Result<UploadPlan, DispatchError> {
        let id = application.id;
        let mut audit = Vec::new();

        application.advance_to(LoanStatus::KycVerified, now)?;
        application.applicant_name = Some(applicant_name.to_string());
        audit.push(AuditLog::record(
            Some(id),
            "KYC verification complete",
            AgentType::Kyc,
            Details::new(),
            now,
        ));

        application.advance_to(LoanStatus::CreditCheck, now)?;
        let report = self.bureau.credit_check(applicant_name);
        application.credit_score = Some(report.score);
        application.risk_level = Some(report.risk_level);
        audit.push(AuditLog::record(
            Some(id),
            "Credit check completed",
            AgentType::Underwriting,
            details_from(&report),
            now,
        ));

        application.advance_to(LoanStatus::Underwriting, now)?;
        let outcome = self.engine.evaluate(
            report.score,
            application.requested_amount,
            application.monthly_income,
        );
        application.risk_score = Some(outcome.risk_score);
        application.dti_ratio = Some(outcome.dti_ratio);

        let prompt = if outcome.approved {
            application.advance_to(LoanStatus::Approved, now)?;
            application.approved_amount = outcome.approved_amount;
            audit.push(AuditLog::record(
                Some(id),
                "Loan approved",
                AgentType::Underwriting,
                outcome_details(&outcome),
                now,
            ));

            let url = letter_url(&self.sanction_letter_base_url, &id);
            application.advance_to(LoanStatus::Sanctioned, now)?;
            application.sanction_letter_url = Some(url.clone());
            audit.push(AuditLog::record(
                Some(id),
                "Sanction letter generated",
                AgentType::Sanction,
                details_of(json!({ "url": url })),
                now,
            ));

            let amount = outcome.approved_amount.unwrap_or_default();
            Prompt::new(
                AgentType::Sanction,
                format!(
                    "Loan approved! Amount: {}. Credit score: {}. Congratulate the user and inform them about the sanction letter.",
                    format_inr(amount),
                    report.score
                ),
            )
        } else {
            application.advance_to(LoanStatus::Rejected, now)?;
            application.rejection_reason = outcome.rejection_reason();
            audit.push(AuditLog::record(
                Some(id),
                "Loan rejected",
                AgentType::Underwriting,
                outcome_details(&outcome),
                now,
            ));

            Prompt::new(
                AgentType::Underwriting,
                format!(
                    "Loan rejected. Credit score: {}. Reasons: {}. Explain the rejection politely and suggest improvements.",
                    report.score,
                    outcome.reason_summaries().join(", ")
                ),
            )
        };

        Ok(UploadPlan {
            agent: AgentType::Underwriting,
            prompt,
            audit,
        })
    }

    async fn message(
        &self,
        session_id: SessionId,
        application_id: Option<ApplicationId>,
        content: String,
    ) -> Result<DispatchResponse, DispatchError> {
        let now = Utc::now();
        let application = match application_id {
            Some(id) => self.store.application(&id).await?,
            None => None,
        };
        let linked = application.as_ref().map(|application| application.id);

        let mut prompt = Prompt::new(AgentType::Master, content.clone());
        if let Some(id) = application_id {
            prompt = prompt.with_context(format!("Application ID: {id}"));
        }
        let reply = reply_or_fallback(self.assistant.as_ref(), &prompt).await;

        let audit = vec![AuditLog::record(
            linked,
            "Message received",
            AgentType::Master,
            details_of(json!({
                "session_id": session_id.as_str(),
                "characters": content.chars().count(),
            })),
            now,
        )];
        let messages = vec![
            ChatMessage::new(
                session_id.clone(),
                linked,
                ChatRole::User,
                content,
                None,
                now,
            ),
            ChatMessage::new(
                session_id,
                linked,
                ChatRole::Assistant,
                reply.clone(),
                Some(AgentType::Master),
                now,
            ),
        ];

        self.commit(Changeset {
            audit,
            messages: messages.clone(),
            ..Changeset::default()
        })
        .await?;

        let audit_logs = match linked {
            Some(id) => self.store.audit_trail(&id).await?,
            None => Vec::new(),
        };

        Ok(DispatchResponse {
            message: reply,
            agent: AgentType::Master,
            application: Some(application),
            document: None,
            audit_logs: Some(audit_logs),
            messages,
        })
    }

    /// Application, latest document per type and audit trail.
    pub async fn application_view(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationView, DispatchError> {
        let application = self
            .store
            .application(id)
            .await?
            .ok_or(DispatchError::ApplicationNotFound(*id))?;
        let documents = latest_per_type(&self.store.documents(id).await?);
        let audit_logs = self.store.audit_trail(id).await?;

        Ok(ApplicationView {
            application,
            documents,
            audit_logs,
        })
    }

    pub async fn sanction_letter(&self, id: &ApplicationId) -> Result<SanctionLetter, DispatchError> {
        let application = self
            .store
            .application(id)
            .await?
            .ok_or(DispatchError::ApplicationNotFound(*id))?;

        SanctionLetter::for_application(&application).ok_or(
            DispatchError::SanctionLetterUnavailable {
                id: *id,
                status: application.status,
            },
        )
    }

    /// Session transcript, oldest first.
    pub async fn transcript(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>, DispatchError> {
        Ok(self.store.session_messages(session_id).await?)
    }

    async fn commit(&self, changeset: Changeset) -> Result<(), DispatchError> {
        self.store.commit(changeset).await.map_err(|err| {
            match &err {
                StoreError::StatusConflict { expected, found } => tracing::warn!(
                    expected = %expected,
                    found = %found,
                    "application moved while the request was in flight"
                ),
                StoreError::StaleRecord(id) => tracing::warn!(
                    application = %id,
                    "application updated by a concurrent request"
                ),
                other => tracing::error!(error = %other, "failed to commit loan changeset"),
            }
            DispatchError::Store(err)
        })
    }

    async fn read_back(
        &self,
        id: &ApplicationId,
    ) -> Result<(LoanApplication, Vec<AuditLog>), DispatchError> {
        let application = self
            .store
            .application(id)
            .await?
            .ok_or(DispatchError::ApplicationNotFound(*id))?;
        let audit_logs = self.store.audit_trail(id).await?;
        Ok((application, audit_logs))
    }
}

/// Underwriting result as recorded in the audit trail, with readable reasons.
fn outcome_details(outcome: &UnderwritingOutcome) -> Details {
    details_of(json!({
        "approved": outcome.approved,
        "approved_amount": outcome.approved_amount,
        "risk_score": outcome.risk_score,
        "dti_ratio": outcome.dti_ratio,
        "reasons": outcome.reason_summaries(),
    }))
}
