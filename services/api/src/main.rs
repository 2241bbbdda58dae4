use loan_origination_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("loan origination error: {err}");
        std::process::exit(1);
    }
}
