//! Visus CLI - inspect and maintain the local clinical record store
//!
//! Adds records, shows what each destination still has to receive, and
//! applies acknowledgements by hand when debugging a transport.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::ack::run_ack;
use crate::commands::add::{run_add_customer, run_add_session};
use crate::commands::common::resolve_db_path;
use crate::commands::delete::run_delete;
use crate::commands::dirty::run_dirty;
use crate::commands::drain::run_drain;
use crate::commands::list::run_list;
use crate::commands::payload::run_payload;
use crate::commands::status::run_status;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "visus=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::AddCustomer {
            first_name,
            last_name,
            birth_date,
            email,
            notes,
        } => run_add_customer(
            &first_name,
            &last_name,
            birth_date,
            email.as_deref(),
            notes.as_deref(),
            &db_path,
        )?,
        Commands::AddSession {
            customer,
            kind,
            left,
            right,
            completed,
        } => run_add_session(customer, &kind, left, right, completed, &db_path)?,
        Commands::List { table, limit, json } => run_list(table, limit, json, &db_path)?,
        Commands::Delete { table, local_id } => run_delete(table, local_id, &db_path)?,
        Commands::Status { json } => run_status(json, &db_path)?,
        Commands::Dirty {
            destination,
            table,
            limit,
            json,
        } => run_dirty(destination, table, limit, json, &db_path)?,
        Commands::Payload {
            destination,
            table,
            limit,
        } => run_payload(destination, table, limit, &db_path)?,
        Commands::Ack {
            destination,
            table,
            local_id,
            updated,
        } => run_ack(destination, table, local_id, updated, &db_path)?,
        Commands::Drain {
            destination,
            batch_size,
        } => run_drain(destination, batch_size, cli.settings.as_deref(), &db_path).await?,
    }

    Ok(())
}
