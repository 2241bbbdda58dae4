mod config;
mod policy;
mod rules;

pub use config::UnderwritingConfig;
pub use policy::DeclineReason;

use serde::{Deserialize, Serialize};

/// Stateless evaluator mapping bureau score, requested amount, and income to a decision.
#[derive(Debug, Clone, Default)]
pub struct UnderwritingEngine {
    config: UnderwritingConfig,
}

impl UnderwritingEngine {
    pub fn new(config: UnderwritingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UnderwritingConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        credit_score: u16,
        requested_amount: u64,
        monthly_income: Option<u64>,
    ) -> UnderwritingOutcome {
        let signals = rules::assess(credit_score, requested_amount, monthly_income, &self.config);
        let decision = policy::decide(credit_score, requested_amount, &signals, &self.config);

        UnderwritingOutcome {
            approved: decision.approved,
            approved_amount: decision.approved_amount,
            risk_score: signals.risk_score,
            dti_ratio: signals.dti_ratio,
            reasons: decision.reasons,
        }
    }
}

/// Evaluate with the default thresholds.
pub fn evaluate_loan(
    credit_score: u16,
    requested_amount: u64,
    monthly_income: Option<u64>,
) -> UnderwritingOutcome {
    UnderwritingEngine::default().evaluate(credit_score, requested_amount, monthly_income)
}

/// Evaluation output persisted onto the application and into the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingOutcome {
    pub approved: bool,
    pub approved_amount: Option<u64>,
    pub risk_score: f64,
    pub dti_ratio: f64,
    pub reasons: Vec<DeclineReason>,
}

impl UnderwritingOutcome {
    pub fn reason_summaries(&self) -> Vec<&'static str> {
        self.reasons.iter().map(|reason| reason.summary()).collect()
    }

    /// Joined reasons for the application's `rejection_reason`; only set on rejection.
    pub fn rejection_reason(&self) -> Option<String> {
        if self.approved || self.reasons.is_empty() {
            None
        } else {
            Some(self.reason_summaries().join("; "))
        }
    }
}
