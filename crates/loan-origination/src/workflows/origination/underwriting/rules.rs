use super::config::UnderwritingConfig;

pub(crate) struct RiskSignals {
    pub dti_ratio: f64,
    pub risk_score: f64,
}

/// Estimated monthly installment against monthly income, as a percentage.
pub(crate) fn dti_ratio(requested_amount: u64, monthly_income: u64) -> f64 {
    (requested_amount as f64 / 12.0) / monthly_income as f64 * 100.0
}

/// 100 at a score of 550, falling by one point per three score points, clamped to [0, 100].
pub(crate) fn risk_score(credit_score: u16) -> f64 {
    let raw = 100.0 - (f64::from(credit_score) - 550.0) / 3.0;
    raw.clamp(0.0, 100.0)
}

pub(crate) fn assess(
    credit_score: u16,
    requested_amount: u64,
    monthly_income: Option<u64>,
    config: &UnderwritingConfig,
) -> RiskSignals {
    let income = monthly_income
        .filter(|income| *income > 0)
        .unwrap_or(config.default_monthly_income);

    RiskSignals {
        dti_ratio: dti_ratio(requested_amount, income),
        risk_score: risk_score(credit_score),
    }
}
