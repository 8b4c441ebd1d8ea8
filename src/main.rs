use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agroquery::cli::{self, Cli};
use agroquery::commands;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for results.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        cli::Commands::Search { query, format, limit, explain } => {
            commands::search::run(&query, format, limit, explain).await?
        }
        cli::Commands::Samples => commands::samples::run()?,
        cli::Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
