//! Database migrations

use std::collections::HashSet;

use rusqlite::{params, Connection, Transaction};

use crate::error::{Error, Result};
use crate::schema::TableSchema;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations of the store's own metadata tables
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: version tracking and the synced-table registry
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS synced_tables (
            name TEXT PRIMARY KEY,
            registered_at INTEGER NOT NULL
        );
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

/// Create an entity table, or bring an existing one up to its declared shape.
///
/// Columns added since the table was created (typically the dirty flag of a
/// new destination) are appended with `ALTER TABLE`. A new dirty column
/// defaults to 1, so existing rows are pushed to the new destination.
pub fn ensure_table(tx: &Transaction<'_>, schema: &TableSchema) -> Result<()> {
    tx.execute(&schema.create_table_sql(), [])?;

    let existing = existing_columns(tx, schema.name())?;
    for column in schema.columns() {
        if existing.contains(&column.name) {
            continue;
        }
        if column.is_primary_key || (column.is_not_null && column.default_value.is_none()) {
            return Err(Error::schema(
                schema.name(),
                format!(
                    "cannot add column '{}' to an existing table without a default",
                    column.name
                ),
            ));
        }
        tx.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN {}",
                schema.name(),
                column.definition_sql()
            ),
            [],
        )?;
        tracing::info!("Added column {} to table {}", column.name, schema.name());
    }

    for statement in schema.create_index_sql() {
        tx.execute(&statement, [])?;
    }

    tx.execute(
        "INSERT OR IGNORE INTO synced_tables (name, registered_at) VALUES (?, ?)",
        params![schema.name(), crate::util::now_millis()],
    )?;
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(names)
}
