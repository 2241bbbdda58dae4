use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loosely-typed key/value payload attached to audit events and chat messages.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-held conversation token passed on every dispatcher call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when a stored label does not map onto a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} label '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownLabel {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Status tracked throughout the origination lifecycle. Transitions live in `lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Initiated,
    KycPending,
    KycVerified,
    CreditCheck,
    Underwriting,
    Approved,
    Rejected,
    Sanctioned,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 8] = [
        LoanStatus::Initiated,
        LoanStatus::KycPending,
        LoanStatus::KycVerified,
        LoanStatus::CreditCheck,
        LoanStatus::Underwriting,
        LoanStatus::Approved,
        LoanStatus::Rejected,
        LoanStatus::Sanctioned,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Initiated => "initiated",
            LoanStatus::KycPending => "kyc_pending",
            LoanStatus::KycVerified => "kyc_verified",
            LoanStatus::CreditCheck => "credit_check",
            LoanStatus::Underwriting => "underwriting",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
            LoanStatus::Sanctioned => "sanctioned",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoanStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        LoanStatus::ALL
            .into_iter()
            .find(|status| status.label() == value)
            .ok_or_else(|| UnknownLabel::new("loan status", value))
    }
}

/// Logical responsibility that produced a message or audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Master,
    Negotiation,
    Kyc,
    Underwriting,
    Sanction,
    Compliance,
}

impl AgentType {
    pub const fn label(self) -> &'static str {
        match self {
            AgentType::Master => "master",
            AgentType::Negotiation => "negotiation",
            AgentType::Kyc => "kyc",
            AgentType::Underwriting => "underwriting",
            AgentType::Sanction => "sanction",
            AgentType::Compliance => "compliance",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            AgentType::Master => "Loan Assistant",
            AgentType::Negotiation => "Negotiation Agent",
            AgentType::Kyc => "KYC Agent",
            AgentType::Underwriting => "Underwriting Agent",
            AgentType::Sanction => "Sanction Agent",
            AgentType::Compliance => "Compliance Agent",
        }
    }
}

impl FromStr for AgentType {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "master" => Ok(AgentType::Master),
            "negotiation" => Ok(AgentType::Negotiation),
            "kyc" => Ok(AgentType::Kyc),
            "underwriting" => Ok(AgentType::Underwriting),
            "sanction" => Ok(AgentType::Sanction),
            "compliance" => Ok(AgentType::Compliance),
            other => Err(UnknownLabel::new("agent type", other)),
        }
    }
}

/// Risk bucket derived from the bureau score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(UnknownLabel::new("risk level", other)),
        }
    }
}

/// Identity documents accepted during KYC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pan,
    Aadhaar,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::Pan => "pan",
            DocumentType::Aadhaar => "aadhaar",
        }
    }

    /// Upper-case tag used in audit labels and assistant prompts.
    pub const fn tag(self) -> &'static str {
        match self {
            DocumentType::Pan => "PAN",
            DocumentType::Aadhaar => "AADHAAR",
        }
    }
}

impl FromStr for DocumentType {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pan" => Ok(DocumentType::Pan),
            "aadhaar" => Ok(DocumentType::Aadhaar),
            other => Err(UnknownLabel::new("document type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
        }
    }
}

impl FromStr for VerificationStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "failed" => Ok(VerificationStatus::Failed),
            other => Err(UnknownLabel::new("verification status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub const fn label(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::System => "system",
        }
    }
}

impl FromStr for ChatRole {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            "system" => Ok(ChatRole::System),
            other => Err(UnknownLabel::new("chat role", other)),
        }
    }
}

/// One borrower's loan request and its evolving decision state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub applicant_name: Option<String>,
    pub requested_amount: u64,
    pub approved_amount: Option<u64>,
    pub monthly_income: Option<u64>,
    pub status: LoanStatus,
    pub credit_score: Option<u16>,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: Option<f64>,
    pub dti_ratio: Option<f64>,
    pub rejection_reason: Option<String>,
    pub sanction_letter_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanApplication {
    /// Fresh application in the `initiated` entry state.
    pub fn new(requested_amount: u64, monthly_income: Option<u64>, at: DateTime<Utc>) -> Self {
        Self {
            id: ApplicationId::generate(),
            applicant_name: None,
            requested_amount,
            approved_amount: None,
            monthly_income,
            status: LoanStatus::Initiated,
            credit_score: None,
            risk_level: None,
            risk_score: None,
            dti_ratio: None,
            rejection_reason: None,
            sanction_letter_url: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Identity document captured during KYC along with the mocked OCR output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycDocument {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub document_type: DocumentType,
    pub file_url: String,
    pub extracted_name: Option<String>,
    pub extracted_id: Option<String>,
    pub extracted_dob: Option<String>,
    pub extracted_address: Option<String>,
    pub ocr_confidence: Option<f64>,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a significant pipeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub application_id: Option<ApplicationId>,
    pub action: String,
    pub agent_type: AgentType,
    pub details: Details,
    pub created_at: DateTime<Utc>,
}

/// Transcript entry owned by a session and optionally linked to an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: SessionId,
    pub application_id: Option<ApplicationId>,
    pub role: ChatRole,
    pub content: String,
    pub agent_type: Option<AgentType>,
    pub metadata: Details,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        session_id: SessionId,
        application_id: Option<ApplicationId>,
        role: ChatRole,
        content: impl Into<String>,
        agent_type: Option<AgentType>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            application_id,
            role,
            content: content.into(),
            agent_type,
            metadata: Details::new(),
            created_at: at,
        }
    }
}

/// Set of document types recorded for an application, regardless of re-uploads.
pub fn uploaded_document_types(documents: &[KycDocument]) -> BTreeSet<DocumentType> {
    documents
        .iter()
        .map(|document| document.document_type)
        .collect()
}

/// Keep only the most recent upload per document type; input is expected oldest-first.
pub fn latest_per_type(documents: &[KycDocument]) -> Vec<KycDocument> {
    let mut latest: BTreeMap<DocumentType, &KycDocument> = BTreeMap::new();
    for document in documents {
        latest.insert(document.document_type, document);
    }
    latest.into_values().cloned().collect()
}
