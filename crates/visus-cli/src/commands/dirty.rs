use std::path::Path;

use visus_core::Destination;

use crate::cli::TableArg;
use crate::commands::common::{dirty_item, format_dirty_lines, open_database, open_source, DirtyItem};
use crate::error::CliError;

pub fn run_dirty(
    destination: Destination,
    table: TableArg,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let batch = open_source(&db, table)?.dirty_batch(destination, limit)?;

    if as_json {
        let items = batch.iter().map(dirty_item).collect::<Vec<DirtyItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if batch.is_empty() {
        println!("Nothing pending for {destination} in {}.", table.table_name());
    } else {
        for line in format_dirty_lines(&batch) {
            println!("{line}");
        }
    }

    Ok(())
}
