use std::path::Path;

use visus_core::{Customer, RecordStore, TestSession};

use crate::cli::TableArg;
use crate::commands::common::{format_customer_lines, format_session_lines, open_database};
use crate::error::CliError;

pub fn run_list(table: TableArg, limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;

    let (json, lines) = match table {
        TableArg::Customers => {
            let records = RecordStore::<Customer>::open(&db)?.list(limit, 0)?;
            (serde_json::to_string_pretty(&records)?, format_customer_lines(&records))
        }
        TableArg::Sessions => {
            let records = RecordStore::<TestSession>::open(&db)?.list(limit, 0)?;
            (serde_json::to_string_pretty(&records)?, format_session_lines(&records))
        }
    };

    if as_json {
        println!("{json}");
    } else {
        for line in lines {
            println!("{line}");
        }
    }

    Ok(())
}
