use serde::{Deserialize, Serialize};

/// Thresholds applied by the underwriting evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingConfig {
    pub minimum_credit_score: u16,
    pub maximum_dti_ratio: f64,
    pub borderline_credit_floor: u16,
    pub borderline_dti_ratio: f64,
    pub borderline_approval_percent: u64,
    pub default_monthly_income: u64,
}

impl Default for UnderwritingConfig {
    fn default() -> Self {
        Self {
            minimum_credit_score: 650,
            maximum_dti_ratio: 50.0,
            borderline_credit_floor: 600,
            borderline_dti_ratio: 40.0,
            borderline_approval_percent: 70,
            default_monthly_income: 50_000,
        }
    }
}
