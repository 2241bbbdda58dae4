use crate::infra::build_assistant;
use clap::Args;
use loan_origination::config::AppConfig;
use loan_origination::error::AppError;
use loan_origination::workflows::origination::{
    format_inr, write_csv, DispatchResponse, InMemoryLoanStore, LoanChatService, SanctionLetter,
    SimulatedBureau, UnderwritingEngine,
};
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Requested loan amount in rupees
    #[arg(long, default_value_t = 500_000)]
    pub(crate) amount: u64,
    /// Declared monthly income; underwriting assumes the configured default when omitted
    #[arg(long)]
    pub(crate) monthly_income: Option<u64>,
    /// Seed for the simulated bureau so runs are reproducible
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Write the full audit trail to this CSV file
    #[arg(long)]
    pub(crate) audit_csv: Option<PathBuf>,
    /// Session token used for the transcript
    #[arg(long, default_value = "cli-demo")]
    pub(crate) session: String,
}

#[derive(Args, Debug)]
pub(crate) struct UnderwriteArgs {
    /// Bureau score to evaluate
    #[arg(long)]
    pub(crate) credit_score: u16,
    /// Requested loan amount in rupees
    #[arg(long)]
    pub(crate) amount: u64,
    /// Declared monthly income
    #[arg(long)]
    pub(crate) monthly_income: Option<u64>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        amount,
        monthly_income,
        seed,
        audit_csv,
        session,
    } = args;

    let config = AppConfig::load()?;
    let bureau = match seed.or(config.origination.bureau_seed) {
        Some(seed) => SimulatedBureau::seeded(seed),
        None => SimulatedBureau::from_entropy(),
    };
    let store = Arc::new(InMemoryLoanStore::default());
    let service = LoanChatService::new(
        store.clone(),
        Arc::new(build_assistant(&config.assistant)?),
        Arc::new(bureau),
        config.origination.pipeline(),
    );

    println!("Loan origination demo");
    let mut request = json!({ "action": "init", "sessionId": session });
    print_turn("init", &service.dispatch(request).await?);

    request = json!({
        "action": "select_amount",
        "sessionId": session,
        "amount": amount,
        "monthlyIncome": monthly_income,
    });
    let selected = service.dispatch(request).await?;
    print_turn("select_amount", &selected);

    let Some(application_id) = selected.application().map(|application| application.id) else {
        println!("No application was created; stopping");
        return Ok(());
    };

    for document_type in ["pan", "aadhaar"] {
        request = json!({
            "action": "upload_kyc",
            "sessionId": session,
            "applicationId": application_id,
            "documentType": document_type,
            "fileUrl": format!("demo://{application_id}/{document_type}.jpg"),
        });
        print_turn("upload_kyc", &service.dispatch(request).await?);
    }

    let view = service.application_view(&application_id).await?;
    let application = &view.application;
    println!("\nDecision");
    println!("- status: {}", application.status);
    println!("- requested: {}", format_inr(application.requested_amount));
    if let Some(score) = application.credit_score {
        println!("- credit score: {score}");
    }
    if let Some(dti) = application.dti_ratio {
        println!("- debt-to-income: {dti:.1}%");
    }
    if let Some(reason) = &application.rejection_reason {
        println!("- rejection reason: {reason}");
    }
    if let Some(letter) = SanctionLetter::for_application(application) {
        println!(
            "- sanction letter {} for {} at {}",
            letter.reference, letter.sanctioned_amount_display, letter.url
        );
    }

    println!("\nAudit trail (newest first)");
    for entry in &view.audit_logs {
        println!(
            "  {} [{}] {}",
            entry.created_at.format("%H:%M:%S%.3f"),
            entry.agent_type.display_name(),
            entry.action
        );
    }

    if let Some(path) = audit_csv {
        let writer = BufWriter::new(File::create(&path)?);
        let entries = store.all_audit_logs();
        write_csv(&entries, writer)?;
        println!("\nWrote {} audit rows to {}", entries.len(), path.display());
    }

    Ok(())
}

fn print_turn(action: &str, response: &DispatchResponse) {
    println!(
        "\n> {action} ({})\n{}",
        response.agent.display_name(),
        response.message
    );
    if let Some(application) = response.application() {
        println!("  application {} is {}", application.id, application.status);
    }
    if let Some(document) = &response.document {
        println!(
            "  {} extracted for {} ({:.1}% confidence)",
            document.document_type.tag(),
            document.extracted_name.as_deref().unwrap_or("unknown"),
            document.ocr_confidence.unwrap_or_default()
        );
    }
}

pub(crate) fn run_underwrite(args: UnderwriteArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = UnderwritingEngine::new(config.origination.pipeline().underwriting);
    let outcome = engine.evaluate(args.credit_score, args.amount, args.monthly_income);

    println!("Underwriting decision");
    println!(
        "- {} for {}",
        if outcome.approved { "approved" } else { "rejected" },
        format_inr(args.amount)
    );
    if let Some(approved_amount) = outcome.approved_amount {
        println!("- approved amount: {}", format_inr(approved_amount));
    }
    println!("- risk score: {:.1}", outcome.risk_score);
    println!("- debt-to-income: {:.1}%", outcome.dti_ratio);
    for reason in outcome.reason_summaries() {
        println!("- reason: {reason}");
    }

    Ok(())
}
