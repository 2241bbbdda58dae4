use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::domain::{DocumentType, LoanApplication, LoanStatus};

/// Document types that must all be present before the credit check may start.
pub const REQUIRED_KYC_DOCUMENTS: [DocumentType; 2] = [DocumentType::Pan, DocumentType::Aadhaar];

/// Raised when a status change does not follow the lifecycle graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("illegal transition from {from} to {to}")]
    IllegalTransition { from: LoanStatus, to: LoanStatus },
    #[error("application is {status} and no longer accepts KYC uploads")]
    UploadsClosed { status: LoanStatus },
}

impl LoanStatus {
    /// The only statuses reachable in a single step from `self`.
    pub const fn successors(self) -> &'static [LoanStatus] {
        match self {
            LoanStatus::Initiated => &[LoanStatus::KycPending],
            LoanStatus::KycPending => &[LoanStatus::KycVerified],
            LoanStatus::KycVerified => &[LoanStatus::CreditCheck],
            LoanStatus::CreditCheck => &[LoanStatus::Underwriting],
            LoanStatus::Underwriting => &[LoanStatus::Approved, LoanStatus::Rejected],
            LoanStatus::Approved => &[LoanStatus::Sanctioned],
            LoanStatus::Rejected | LoanStatus::Sanctioned => &[],
        }
    }

    pub fn can_advance_to(self, next: LoanStatus) -> bool {
        self.successors().contains(&next)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Rejected | LoanStatus::Sanctioned)
    }

    /// Underwriting has produced a decision; nothing the borrower does may change it.
    pub const fn is_decided(self) -> bool {
        matches!(
            self,
            LoanStatus::Approved | LoanStatus::Rejected | LoanStatus::Sanctioned
        )
    }

    /// Position along the happy path, used to assert forward-only progress.
    pub const fn rank(self) -> u8 {
        match self {
            LoanStatus::Initiated => 0,
            LoanStatus::KycPending => 1,
            LoanStatus::KycVerified => 2,
            LoanStatus::CreditCheck => 3,
            LoanStatus::Underwriting => 4,
            LoanStatus::Approved | LoanStatus::Rejected => 5,
            LoanStatus::Sanctioned => 6,
        }
    }
}

impl LoanApplication {
    /// Move the application one step along the lifecycle graph.
    pub fn advance_to(&mut self, next: LoanStatus, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        if !self.status.can_advance_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn ensure_accepting_uploads(&self) -> Result<(), LifecycleError> {
        if self.status == LoanStatus::KycPending {
            Ok(())
        } else {
            Err(LifecycleError::UploadsClosed {
                status: self.status,
            })
        }
    }
}

/// KYC is complete once every required document type has been recorded at least once.
pub fn kyc_complete(uploaded: &BTreeSet<DocumentType>) -> bool {
    REQUIRED_KYC_DOCUMENTS
        .iter()
        .all(|required| uploaded.contains(required))
}
