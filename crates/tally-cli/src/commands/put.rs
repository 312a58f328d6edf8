use std::path::Path;

use tally_core::Record;

use crate::commands::common::{open_ledger, parse_record_data, parse_record_id};
use crate::error::CliError;

pub async fn run_put(
    collection: &str,
    partition: &str,
    data: &str,
    id: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let fields = parse_record_data(data)?;
    let ledger = open_ledger(db_path).await?;

    let record = match id {
        Some(id) => {
            let record_id = parse_record_id(id)?;
            match ledger.get_record(collection, &record_id).await? {
                Some(mut existing) => {
                    existing.data = fields;
                    existing.partition = partition.to_string();
                    existing
                }
                None => {
                    let mut record = Record::new(partition, fields);
                    record.id = record_id;
                    record
                }
            }
        }
        None => Record::new(partition, fields),
    };

    let saved = ledger.save_record(collection, record).await?;
    println!("{}", saved.id);
    Ok(())
}
