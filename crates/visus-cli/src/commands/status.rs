use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use visus_core::{Customer, Destination, RecordStore, TestSession};

use crate::commands::common::{open_all_sources, open_database};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct TableStatus {
    pub table: String,
    /// Rows present, including records waiting to be retired
    pub records: usize,
    pub pending: BTreeMap<Destination, usize>,
}

pub fn collect_status(db_path: &Path) -> Result<Vec<TableStatus>, CliError> {
    let db = open_database(db_path)?;
    let counts = [
        RecordStore::<Customer>::open(&db)?.count()?,
        RecordStore::<TestSession>::open(&db)?.count()?,
    ];

    open_all_sources(&db)?
        .iter()
        .zip(counts)
        .map(|(source, records)| -> Result<TableStatus, CliError> {
            let pending = Destination::ALL
                .into_iter()
                .map(|destination| {
                    source
                        .pending_count(destination)
                        .map(|count| (destination, count))
                })
                .collect::<visus_core::Result<BTreeMap<_, _>>>()?;
            Ok(TableStatus {
                table: source.table().to_string(),
                records,
                pending,
            })
        })
        .collect()
}

pub fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let statuses = collect_status(db_path)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    for status in &statuses {
        let pending = status
            .pending
            .iter()
            .map(|(destination, count)| format!("{destination}={count}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:<14}  records={:<6}  pending: {pending}", status.table, status.records);
    }
    Ok(())
}
