use std::path::Path;

use crate::commands::common::{
    format_record_lines, open_ledger, record_to_list_item, RecordListItem,
};
use crate::error::CliError;

pub async fn run_list(
    collection: &str,
    partition: &str,
    include_deleted: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let ledger = open_ledger(db_path).await?;
    let records = ledger
        .list_records(collection, partition, include_deleted)
        .await?;

    if as_json {
        let json_items = records
            .iter()
            .map(record_to_list_item)
            .collect::<Vec<RecordListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No records in {collection} for partition '{}'.", partition.trim());
    } else {
        for line in format_record_lines(&records) {
            println!("{line}");
        }
    }

    Ok(())
}
