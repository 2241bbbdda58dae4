use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ApplicationId, LoanApplication, LoanStatus, RiskLevel};

/// Public object path under which sanction letters are published.
pub const SANCTION_LETTER_PATH: &str = "storage/v1/object/public/sanction-letters";

pub fn letter_url(base_url: &str, application_id: &ApplicationId) -> String {
    format!(
        "{}/{SANCTION_LETTER_PATH}/{application_id}.pdf",
        base_url.trim_end_matches('/')
    )
}

/// Rupee amount with Indian digit grouping, e.g. `₹5,00,000`.
pub fn format_inr(amount: u64) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{digits}");
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("₹{},{tail}", groups.join(","))
}

/// Letter view rendered for a sanctioned application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanctionLetter {
    pub reference: String,
    pub application_id: ApplicationId,
    pub applicant_name: Option<String>,
    pub sanctioned_amount: u64,
    pub sanctioned_amount_display: String,
    pub requested_amount: u64,
    pub credit_score: Option<u16>,
    pub risk_level: Option<RiskLevel>,
    pub issued_at: DateTime<Utc>,
    pub url: String,
}

impl SanctionLetter {
    pub fn for_application(application: &LoanApplication) -> Option<Self> {
        if application.status != LoanStatus::Sanctioned {
            return None;
        }
        let sanctioned_amount = application.approved_amount?;
        let url = application.sanction_letter_url.clone()?;

        Some(Self {
            reference: reference_for(&application.id),
            application_id: application.id,
            applicant_name: application.applicant_name.clone(),
            sanctioned_amount,
            sanctioned_amount_display: format_inr(sanctioned_amount),
            requested_amount: application.requested_amount,
            credit_score: application.credit_score,
            risk_level: application.risk_level,
            issued_at: application.updated_at,
            url,
        })
    }
}

/// Short human-readable reference derived from the application id.
pub fn reference_for(application_id: &ApplicationId) -> String {
    let simple = application_id.0.simple().to_string();
    format!("SL-{}", simple[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn groups_rupees_in_lakhs_and_crores() {
        assert_eq!(format_inr(0), "₹0");
        assert_eq!(format_inr(999), "₹999");
        assert_eq!(format_inr(1_000), "₹1,000");
        assert_eq!(format_inr(50_000), "₹50,000");
        assert_eq!(format_inr(350_000), "₹3,50,000");
        assert_eq!(format_inr(500_000), "₹5,00,000");
        assert_eq!(format_inr(12_345_678), "₹1,23,45,678");
    }

    #[test]
    fn letter_url_strips_trailing_slash() {
        let id = ApplicationId::generate();
        assert_eq!(
            letter_url("http://localhost:54321/", &id),
            format!("http://localhost:54321/storage/v1/object/public/sanction-letters/{id}.pdf")
        );
    }

    #[test]
    fn letter_only_exists_for_sanctioned_applications() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let mut application = LoanApplication::new(500_000, None, at);
        assert!(SanctionLetter::for_application(&application).is_none());

        application.status = LoanStatus::Sanctioned;
        application.approved_amount = Some(350_000);
        application.sanction_letter_url = Some(letter_url("http://bucket", &application.id));

        let letter = SanctionLetter::for_application(&application).expect("letter");
        assert_eq!(letter.sanctioned_amount_display, "₹3,50,000");
        assert_eq!(letter.requested_amount, 500_000);
        assert!(letter.reference.starts_with("SL-"));
        assert_eq!(letter.reference.len(), 11);
    }
}
