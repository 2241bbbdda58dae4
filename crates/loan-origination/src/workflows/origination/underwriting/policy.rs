use serde::{Deserialize, Serialize};

use super::config::UnderwritingConfig;
use super::rules::RiskSignals;

/// Reasons recorded against an application that misses a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    CreditScoreBelowMinimum,
    DebtToIncomeTooHigh,
}

impl DeclineReason {
    pub const fn summary(self) -> &'static str {
        match self {
            DeclineReason::CreditScoreBelowMinimum => "Credit score below minimum threshold",
            DeclineReason::DebtToIncomeTooHigh => "Debt-to-income ratio too high",
        }
    }
}

pub(crate) struct Decision {
    pub approved: bool,
    pub approved_amount: Option<u64>,
    pub reasons: Vec<DeclineReason>,
}

pub(crate) fn decide(
    credit_score: u16,
    requested_amount: u64,
    signals: &RiskSignals,
    config: &UnderwritingConfig,
) -> Decision {
    let meets_score = credit_score >= config.minimum_credit_score;
    let meets_dti = signals.dti_ratio < config.maximum_dti_ratio;

    let borderline = (config.borderline_credit_floor..config.minimum_credit_score)
        .contains(&credit_score)
        && signals.dti_ratio < config.borderline_dti_ratio;

    let (approved, approved_amount) = if borderline {
        let reduced = u128::from(requested_amount) * u128::from(config.borderline_approval_percent)
            / 100;
        (true, Some(u64::try_from(reduced).unwrap_or(u64::MAX)))
    } else if meets_score && meets_dti {
        (true, Some(requested_amount))
    } else {
        (false, None)
    };

    // Reasons are kept even when the borderline band grants a reduced approval.
    let mut reasons = Vec::new();
    if !meets_score {
        reasons.push(DeclineReason::CreditScoreBelowMinimum);
    }
    if !meets_dti {
        reasons.push(DeclineReason::DebtToIncomeTooHigh);
    }

    Decision {
        approved,
        approved_amount,
        reasons,
    }
}
