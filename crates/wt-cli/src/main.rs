use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{distractions, limits, report, run};
use wt_cli::{Cli, Commands, Config, DistractionsAction, LimitsAction};
use wt_store::SqliteStore;

/// Load config and open the store, ensuring the parent directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(SqliteStore, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let store = SqliteStore::open(&config.database_path).context("failed to open database")?;
    Ok((store, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Run { ephemeral }) => {
            let config =
                Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
            tracing::debug!(?config, "loaded configuration");

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build runtime")?;
            runtime.block_on(run::run(&config, *ephemeral))?;
        }
        Some(Commands::Report { date, json }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            report::run(&store, date, *json)?;
        }
        Some(Commands::Limits { action }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            match action {
                LimitsAction::List => limits::list(&store)?,
                LimitsAction::Set { domain, minutes } => limits::set(&store, domain, *minutes)?,
                LimitsAction::Remove { domain } => limits::remove(&store, domain)?,
            }
        }
        Some(Commands::Distractions { action }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            match action {
                DistractionsAction::List => distractions::list(&store)?,
                DistractionsAction::Add { domain } => distractions::add(&store, domain)?,
                DistractionsAction::Remove { domain } => distractions::remove(&store, domain)?,
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
