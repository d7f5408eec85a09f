use std::path::Path;

use visus_core::sync::PushPayload;
use visus_core::Destination;

use crate::cli::TableArg;
use crate::commands::common::{open_database, open_source};
use crate::error::CliError;

pub fn run_payload(
    destination: Destination,
    table: TableArg,
    limit: usize,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let payloads = open_source(&db, table)?
        .dirty_batch(destination, limit)?
        .into_iter()
        .map(|pending| pending.payload)
        .collect::<Vec<PushPayload>>();

    println!("{}", serde_json::to_string_pretty(&payloads)?);
    Ok(())
}
