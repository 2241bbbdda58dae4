//! Personal-loan origination pipeline.
//!
//! Status transitions, the underwriting rubric, the simulated bureau, the audit trail and the
//! chat dispatcher that ties them together behind one endpoint.

pub mod assistant;
pub mod audit;
pub mod bureau;
pub mod dispatcher;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod router;
pub mod sanction;
pub mod underwriting;

#[cfg(test)]
mod tests;

pub use assistant::{
    reply_or_fallback, system_instruction, Assistant, AssistantError, ChatCompletionsAssistant,
    Prompt,
};
pub use audit::{write_csv, AuditExportError, AUDIT_CSV_HEADER};
pub use bureau::{CreditReport, OcrExtraction, SimulatedBureau, VerificationBureau};
pub use dispatcher::{
    ApplicationView, DispatchError, DispatchRequest, DispatchResponse, LoanChatService,
    PipelineConfig,
};
pub use domain::{
    AgentType, ApplicationId, AuditLog, ChatMessage, ChatRole, Details, DocumentType, KycDocument,
    LoanApplication, LoanStatus, RiskLevel, SessionId, VerificationStatus,
};
pub use lifecycle::{kyc_complete, LifecycleError, REQUIRED_KYC_DOCUMENTS};
pub use memory::InMemoryLoanStore;
pub use postgres::PgLoanStore;
pub use repository::{ApplicationWrite, Changeset, LoanStore, StoreError};
pub use router::loan_router;
pub use sanction::{format_inr, letter_url, SanctionLetter};
pub use underwriting::{
    evaluate_loan, DeclineReason, UnderwritingConfig, UnderwritingEngine, UnderwritingOutcome,
};
