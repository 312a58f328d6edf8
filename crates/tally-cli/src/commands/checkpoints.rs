use std::path::Path;

use tally_core::sync::CheckpointStore;

use crate::commands::common::{format_checkpoint_lines, open_local};
use crate::error::CliError;

pub async fn run_checkpoints(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_local(db_path).await?;
    let checkpoints = store.checkpoints().list().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&checkpoints)?);
        return Ok(());
    }

    if checkpoints.is_empty() {
        println!("No sync checkpoints recorded.");
        return Ok(());
    }

    for line in format_checkpoint_lines(&checkpoints) {
        println!("{line}");
    }
    Ok(())
}
