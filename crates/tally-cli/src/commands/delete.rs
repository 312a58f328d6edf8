use std::path::Path;

use crate::commands::common::{open_ledger, parse_record_id};
use crate::error::CliError;

pub async fn run_delete(collection: &str, id: &str, db_path: &Path) -> Result<(), CliError> {
    let record_id = parse_record_id(id)?;
    let ledger = open_ledger(db_path).await?;

    let record = ledger
        .delete_record(collection, &record_id)
        .await
        .map_err(|error| match error {
            tally_core::Error::NotFound(what) => CliError::RecordNotFound(what),
            other => other.into(),
        })?;
    println!("{}", record.id);
    Ok(())
}
