use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use procura_api::app::{self, AppServices};
use procura_infra::ProcuraConfig;

/// Procurement pipeline: HTTP API and one-shot maintenance commands.
#[derive(Parser, Debug)]
#[command(name = "procura", version, about = "Automated procurement pipeline")]
struct Cli {
    /// Seed the in-memory store with a demo item and two vendors (only without DATABASE_URL)
    #[arg(long, global = true)]
    seed_demo: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run one procurement cycle and print the outcome as JSON
    Cycle,
    /// Flag stale saga intents for manual review and print the report as JSON
    Reconcile,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procura_observability::init();

    let cli = Cli::parse();
    let config = ProcuraConfig::from_env().context("loading configuration")?;
    let services = AppServices::from_config(&config, cli.seed_demo).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let listener = tokio::net::TcpListener::bind(config.listen_addr)
                .await
                .with_context(|| format!("binding {}", config.listen_addr))?;
            tracing::info!("listening on {}", listener.local_addr()?);
            axum::serve(listener, app::build_app(Arc::new(services))).await?;
        }
        Command::Cycle => {
            let outcome = services.run_cycle().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Reconcile => {
            let report = services.reconcile().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
