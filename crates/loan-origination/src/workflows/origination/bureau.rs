//! Simulated credit bureau and OCR services.
//!
//! Neither service performs real verification. Both draw synthetic data from an injected
//! random source so tests and demos can reproduce a run.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use super::domain::{DocumentType, RiskLevel};

/// Bureau scores are drawn from `[550, 850)`.
pub const CREDIT_SCORE_RANGE: std::ops::Range<u16> = 550..850;
/// OCR confidence is drawn from `[85, 95)`.
pub const OCR_CONFIDENCE_RANGE: std::ops::Range<f64> = 85.0..95.0;

const SYNTHETIC_NAMES: [&str; 4] = ["Rahul Sharma", "Priya Patel", "Amit Kumar", "Sneha Gupta"];
const SYNTHETIC_DOB: &str = "15/08/1990";
const SYNTHETIC_ADDRESS: &str = "123 Main Street, Mumbai, Maharashtra 400001";

/// Bureau response for a single applicant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    pub score: u16,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
}

impl CreditReport {
    pub fn from_score(score: u16) -> Self {
        let risk_level = if score < 650 {
            RiskLevel::High
        } else if score < 700 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let factors = if score < 700 {
            ["Limited credit history", "Recent credit inquiries"]
        } else {
            ["Good payment history", "Low credit utilization"]
        };

        Self {
            score,
            risk_level,
            factors: factors.iter().map(|factor| factor.to_string()).collect(),
        }
    }
}

/// Fields lifted off an identity document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrExtraction {
    pub name: String,
    pub id_number: String,
    pub dob: String,
    pub address: String,
    pub confidence: f64,
}

pub fn synthetic_id_number(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Pan => "ABCDE1234F",
        DocumentType::Aadhaar => "1234 5678 9012",
    }
}

pub fn draw_credit_report<R: Rng + ?Sized>(rng: &mut R) -> CreditReport {
    CreditReport::from_score(rng.gen_range(CREDIT_SCORE_RANGE))
}

pub fn draw_ocr_extraction<R: Rng + ?Sized>(
    rng: &mut R,
    document_type: DocumentType,
) -> OcrExtraction {
    let name = SYNTHETIC_NAMES[rng.gen_range(0..SYNTHETIC_NAMES.len())];
    OcrExtraction {
        name: name.to_string(),
        id_number: synthetic_id_number(document_type).to_string(),
        dob: SYNTHETIC_DOB.to_string(),
        address: SYNTHETIC_ADDRESS.to_string(),
        confidence: rng.gen_range(OCR_CONFIDENCE_RANGE),
    }
}

/// Strategy seam standing in for the external bureau and OCR vendors.
pub trait VerificationBureau: Send + Sync {
    fn credit_check(&self, applicant_name: &str) -> CreditReport;
    fn extract(&self, document_type: DocumentType) -> OcrExtraction;
}

/// Bureau backed by a `rand` generator.
pub struct SimulatedBureau<R = StdRng> {
    rng: Mutex<R>,
}

impl SimulatedBureau<StdRng> {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore> SimulatedBureau<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl<R: RngCore + Send> VerificationBureau for SimulatedBureau<R> {
    fn credit_check(&self, applicant_name: &str) -> CreditReport {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let report = draw_credit_report(&mut *rng);
        tracing::debug!(applicant = applicant_name, score = report.score, "simulated credit check");
        report
    }

    fn extract(&self, document_type: DocumentType) -> OcrExtraction {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw_ocr_extraction(&mut *rng, document_type)
    }
}
