use anyhow::Result;
use blog_migrate::cli::{run, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may come from a local .env file.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "blog-migrate stopped; completed posts stay in the ledger and are skipped on the next run");
    }
    result
}
