use std::path::Path;

use visus_core::{Customer, RecordStore, TestSession};

use crate::cli::TableArg;
use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run_delete(table: TableArg, local_id: i64, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let sync_id = match table {
        TableArg::Customers => RecordStore::<Customer>::open(&db)?
            .soft_delete(local_id)?
            .sync_id(),
        TableArg::Sessions => RecordStore::<TestSession>::open(&db)?
            .soft_delete(local_id)?
            .sync_id(),
    };

    println!("{sync_id}");
    Ok(())
}
