use crate::workflows::origination::underwriting::{
    evaluate_loan, DeclineReason, UnderwritingConfig, UnderwritingEngine,
};

#[test]
fn default_income_drives_dti_ratio() {
    let outcome = evaluate_loan(720, 600_000, None);
    assert_eq!(outcome.dti_ratio, 600_000.0 / 12.0 / 50_000.0 * 100.0);
    assert_eq!(outcome.dti_ratio, 100.0);
}

#[test]
fn zero_income_falls_back_to_default() {
    let with_zero = evaluate_loan(720, 300_000, Some(0));
    let without = evaluate_loan(720, 300_000, None);
    assert_eq!(with_zero, without);
}

#[test]
fn strong_score_and_low_dti_approves_full_amount() {
    let outcome = evaluate_loan(720, 500_000, Some(200_000));
    assert!(outcome.approved);
    assert_eq!(outcome.approved_amount, Some(500_000));
    assert!(outcome.reasons.is_empty());
    assert_eq!(outcome.rejection_reason(), None);
}

#[test]
fn borderline_band_approves_seventy_percent() {
    let outcome = evaluate_loan(600, 500_000, Some(200_000));
    assert!(outcome.approved);
    assert_eq!(outcome.approved_amount, Some(350_000));
    assert_eq!(outcome.reasons, vec![DeclineReason::CreditScoreBelowMinimum]);
    assert_eq!(outcome.rejection_reason(), None);
}

#[test]
fn borderline_amount_stays_exact_for_huge_requests() {
    let outcome = evaluate_loan(620, 2_000_000_000_000_000_000, Some(u64::MAX));
    assert!(outcome.approved);
    assert_eq!(outcome.approved_amount, Some(1_400_000_000_000_000_000));
}

#[test]
fn borderline_amount_floors_odd_requests() {
    let outcome = evaluate_loan(640, 100_001, Some(200_000));
    assert_eq!(outcome.approved_amount, Some(70_000));
}

#[test]
fn borderline_band_requires_dti_under_forty() {
    // 240000 / 12 / 50000 = 40%
    let outcome = evaluate_loan(620, 240_000, None);
    assert!(!outcome.approved);
    assert_eq!(outcome.approved_amount, None);
}

#[test]
fn high_dti_rejects_even_with_good_score() {
    let outcome = evaluate_loan(800, 500_000, None);
    assert!(!outcome.approved);
    assert_eq!(outcome.approved_amount, None);
    assert_eq!(
        outcome.rejection_reason().as_deref(),
        Some("Debt-to-income ratio too high")
    );
}

#[test]
fn low_score_outside_band_collects_every_reason() {
    let outcome = evaluate_loan(580, 500_000, None);
    assert!(!outcome.approved);
    assert_eq!(
        outcome.reason_summaries(),
        vec![
            "Credit score below minimum threshold",
            "Debt-to-income ratio too high"
        ]
    );
    assert_eq!(
        outcome.rejection_reason().as_deref(),
        Some("Credit score below minimum threshold; Debt-to-income ratio too high")
    );
}

#[test]
fn dti_exactly_fifty_is_too_high() {
    // 300000 / 12 / 50000 = 50%
    let outcome = evaluate_loan(700, 300_000, None);
    assert_eq!(outcome.dti_ratio, 50.0);
    assert!(!outcome.approved);
    assert_eq!(outcome.reasons, vec![DeclineReason::DebtToIncomeTooHigh]);
}

#[test]
fn risk_score_stays_within_bounds() {
    for score in [0_u16, 300, 550, 551, 650, 700, 849, 850, 900, u16::MAX] {
        let outcome = evaluate_loan(score, 100_000, None);
        assert!(
            (0.0..=100.0).contains(&outcome.risk_score),
            "score {score} produced {}",
            outcome.risk_score
        );
    }
    assert_eq!(evaluate_loan(550, 100_000, None).risk_score, 100.0);
    assert_eq!(evaluate_loan(850, 100_000, None).risk_score, 0.0);
    assert_eq!(evaluate_loan(700, 100_000, None).risk_score, 50.0);
}

#[test]
fn approval_is_monotonic_in_credit_score() {
    for (amount, income) in [(500_000, Some(200_000)), (200_000, None), (500_000, None)] {
        let mut seen_approval = false;
        let mut last_amount = 0;
        for score in 550..=850_u16 {
            let outcome = evaluate_loan(score, amount, income);
            if seen_approval {
                assert!(outcome.approved, "score {score} lost approval");
            }
            seen_approval |= outcome.approved;
            let granted = outcome.approved_amount.unwrap_or(0);
            assert!(granted >= last_amount, "score {score} reduced the amount");
            last_amount = granted;
        }
    }
}

#[test]
fn engine_honours_configured_default_income() {
    let engine = UnderwritingEngine::new(UnderwritingConfig {
        default_monthly_income: 100_000,
        ..UnderwritingConfig::default()
    });
    let outcome = engine.evaluate(700, 500_000, None);
    assert!(outcome.approved);
    assert_eq!(engine.config().minimum_credit_score, 650);
}
