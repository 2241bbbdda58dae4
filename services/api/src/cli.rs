use crate::demo::{run_demo, run_underwrite, DemoArgs, UnderwriteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_origination::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Loan Origination Desk",
    about = "Run or demonstrate the conversational personal-loan origination service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk one borrower from amount selection to a decision in memory
    Demo(DemoArgs),
    /// Evaluate a single underwriting decision without touching any store
    Underwrite(UnderwriteArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Underwrite(args) => run_underwrite(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["loan-origination-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_demo_flags() {
        let cli = Cli::try_parse_from([
            "loan-origination-api",
            "demo",
            "--amount",
            "750000",
            "--monthly-income",
            "120000",
            "--seed",
            "9",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Demo(args)) => {
                assert_eq!(args.amount, 750_000);
                assert_eq!(args.monthly_income, Some(120_000));
                assert_eq!(args.seed, Some(9));
                assert!(args.audit_csv.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn underwrite_requires_credit_score() {
        assert!(Cli::try_parse_from(["loan-origination-api", "underwrite", "--amount", "1"]).is_err());
    }
}
