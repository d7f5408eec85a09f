use std::path::Path;

use visus_core::{AckOutcome, Destination};

use crate::cli::TableArg;
use crate::commands::common::{describe_ack_outcome, open_database, open_source};
use crate::error::CliError;

pub fn apply_manual_ack(
    destination: Destination,
    table: TableArg,
    local_id: i64,
    updated: i64,
    db_path: &Path,
) -> Result<AckOutcome, CliError> {
    let db = open_database(db_path)?;
    Ok(open_source(&db, table)?.apply_ack(destination, local_id, updated, None)?)
}

pub fn run_ack(
    destination: Destination,
    table: TableArg,
    local_id: i64,
    updated: i64,
    db_path: &Path,
) -> Result<(), CliError> {
    let outcome = apply_manual_ack(destination, table, local_id, updated, db_path)?;
    println!("{}", describe_ack_outcome(outcome));
    Ok(())
}
