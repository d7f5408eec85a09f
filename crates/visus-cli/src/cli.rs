use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use visus_core::{Destination, SyncId};

#[derive(Parser)]
#[command(name = "visus")]
#[command(about = "Inspect and maintain the local Visus record store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional sync settings JSON file
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new customer
    AddCustomer {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        birth_date: Option<NaiveDate>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a test session for a customer
    AddSession {
        /// Customer sync id
        #[arg(long, value_name = "SYNC_ID")]
        customer: SyncId,
        /// Test protocol, e.g. visual_acuity
        #[arg(long)]
        kind: String,
        /// Left eye score
        #[arg(long)]
        left: Option<i64>,
        /// Right eye score
        #[arg(long)]
        right: Option<i64>,
        /// Mark the session completed
        #[arg(long)]
        completed: bool,
    },
    /// List live records, newest first
    List {
        #[arg(value_enum)]
        table: TableArg,
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a record for deletion
    Delete {
        #[arg(value_enum)]
        table: TableArg,
        /// Local id of the record
        local_id: i64,
    },
    /// Show record and pending counts per table and destination
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show records waiting for one destination
    Dirty {
        destination: Destination,
        #[arg(value_enum)]
        table: TableArg,
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the payloads a worker would push next
    Payload {
        destination: Destination,
        #[arg(value_enum)]
        table: TableArg,
        /// Number of payloads to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Apply a destination acknowledgement by hand
    Ack {
        destination: Destination,
        #[arg(value_enum)]
        table: TableArg,
        /// Local id of the record
        local_id: i64,
        /// The `updated` version that was pushed
        updated: i64,
    },
    /// Run one sync cycle that prints payloads to stdout and acknowledges them
    Drain {
        destination: Destination,
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TableArg {
    Customers,
    Sessions,
}
