mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut app = config::loader::load_config(cli.config.as_deref())?;
    if let Some(policy) = cli.policy {
        app.authz.policy_path = Some(policy);
    }

    let level = cli.log_level.as_deref().unwrap_or(&app.logging.level);
    observability::init_tracing_with_level(level);

    let format = cli.format.unwrap_or_default();
    match cli.command {
        Commands::Check => commands::check::check(&app.authz, format),
        Commands::Decide(args) => commands::decide::decide(&app.authz, &args, format),
        Commands::Matrix(args) => commands::matrix::matrix(&app.authz, &args, format),
        Commands::Watch => commands::watch::watch(&app.authz).await,
    }
}
