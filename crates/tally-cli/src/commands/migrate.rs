use std::path::Path;

use crate::commands::common::open_local;
use crate::error::CliError;

pub async fn run_migrate(db_path: &Path) -> Result<i32, CliError> {
    let store = open_local(db_path).await?;
    let version = store.schema_version().await?;
    println!("{}: schema version {version}", db_path.display());
    Ok(version)
}
