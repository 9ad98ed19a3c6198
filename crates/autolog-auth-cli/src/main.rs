#[tokio::main]
async fn main() {
    if let Err(e) = autolog_auth_cli::run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
