//! Conversational personal-loan origination desk.
//!
//! The library owns the application lifecycle (amount selection, KYC, credit check,
//! underwriting, sanction), the audit trail, and the single chat dispatcher endpoint
//! consumed by the chat front-end.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
