//! Tally CLI - drive the ledger replication engine from a terminal
//!
//! Edits the local ledger and syncs a business partition with the remote
//! ledger (a Turso database, or another local file for testing).

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::checkpoints::run_checkpoints;
use crate::commands::common::{
    load_engine_config, resolve_config_path, resolve_db_path, resolve_remote_target,
    sync_config_from_env,
};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::migrate::run_migrate;
use crate::commands::put::run_put;
use crate::commands::sync::{run_resync, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Put {
            collection,
            partition,
            data,
            id,
        } => run_put(&collection, &partition, &data, id.as_deref(), &db_path).await?,
        Commands::Delete { collection, id } => run_delete(&collection, &id, &db_path).await?,
        Commands::List {
            collection,
            partition,
            include_deleted,
            json,
        } => run_list(&collection, &partition, include_deleted, json, &db_path).await?,
        Commands::Sync {
            partition,
            direction,
            remote_db,
            watch,
        } => {
            let remote =
                resolve_remote_target(remote_db.as_deref(), sync_config_from_env(), &db_path)?;
            let config = load_engine_config(&config_path)?;
            run_sync(&partition, direction.into(), remote, watch, config, &db_path).await?;
        }
        Commands::Resync {
            partition,
            remote_db,
        } => {
            let remote =
                resolve_remote_target(remote_db.as_deref(), sync_config_from_env(), &db_path)?;
            let config = load_engine_config(&config_path)?;
            run_resync(&partition, remote, config, &db_path).await?;
        }
        Commands::Checkpoints { json } => run_checkpoints(json, &db_path).await?,
        Commands::Migrate => {
            run_migrate(&db_path).await?;
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "tally=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
