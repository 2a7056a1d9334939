use anyhow::Result;
use clap::Parser;

use docx_translate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // credentials may live in a .env next to the documents
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter(rust_log.as_deref()))
        .init();

    cli.run().await
}
