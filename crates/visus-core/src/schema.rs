//! Declarative table schemas
//!
//! An entity declares only its own columns. [`TableSchema::new`] prepends the
//! bookkeeping columns every synced table carries, validates the result, and
//! renders the DDL the record store runs at registration time.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Destination;

/// Local device primary key
pub const LOCAL_ID: &str = "local_id";
/// Globally-unique sync identifier
pub const SYNC_ID: &str = "sync_id";
/// Insert timestamp (Unix ms)
pub const CREATED: &str = "created";
/// Last local mutation timestamp (Unix ms)
pub const UPDATED: &str = "updated";
/// Latest acknowledgement timestamp (Unix ms)
pub const SYNCED: &str = "synced";
/// Soft-delete marker
pub const DELETABLE: &str = "deletable";

/// Logical column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Text,
    /// Stored as 0/1
    Boolean,
    /// Stored as Unix milliseconds
    Timestamp,
    /// Stored as `YYYY-MM-DD` text
    Date,
}

impl ColumnType {
    /// `SQLite` storage type for this column type
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean | Self::Timestamp => "INTEGER",
            Self::Text | Self::Date => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// A single column declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub is_not_null: bool,
    /// SQL literal used as the column default
    pub default_value: Option<String>,
}

impl Column {
    /// Declare a nullable column with no default
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            is_primary_key: false,
            is_auto_increment: false,
            is_not_null: false,
            default_value: None,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.is_not_null = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }

    /// Column definition fragment for `CREATE TABLE` / `ALTER TABLE`
    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.column_type.sql_type());
        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.is_auto_increment {
            sql.push_str(" AUTOINCREMENT");
        }
        if self.is_not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// Bookkeeping columns attached to every table, one dirty flag per destination.
pub fn bookkeeping_columns() -> Vec<Column> {
    let mut columns = vec![
        Column::new(LOCAL_ID, ColumnType::Integer)
            .primary_key()
            .auto_increment(),
        Column::new(SYNC_ID, ColumnType::Text).not_null(),
        Column::new(CREATED, ColumnType::Timestamp).not_null(),
        Column::new(UPDATED, ColumnType::Timestamp).not_null(),
        Column::new(SYNCED, ColumnType::Timestamp),
    ];
    columns.extend(Destination::ALL.into_iter().map(|destination| {
        Column::new(destination.dirty_column(), ColumnType::Boolean)
            .not_null()
            .default_value("1")
    }));
    columns.push(
        Column::new(DELETABLE, ColumnType::Boolean)
            .not_null()
            .default_value("0"),
    );
    columns
}

/// Full shape of one table: bookkeeping columns followed by entity columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    entity_start: usize,
}

impl TableSchema {
    /// Compose and validate a table schema.
    pub fn new(name: impl Into<String>, entity_columns: Vec<Column>) -> Result<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(Error::schema(&name, "table name is not a valid identifier"));
        }

        let mut columns = bookkeeping_columns();
        let entity_start = columns.len();
        columns.extend(entity_columns);

        let schema = Self {
            name,
            columns,
            entity_start,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(Error::schema(
                    &self.name,
                    format!("column name '{}' is not a valid identifier", column.name),
                ));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(Error::schema(
                    &self.name,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            if column.is_auto_increment
                && !(column.is_primary_key && column.column_type == ColumnType::Integer)
            {
                return Err(Error::schema(
                    &self.name,
                    format!(
                        "column '{}' is auto-increment but not an INTEGER primary key",
                        column.name
                    ),
                ));
            }
        }

        match self.columns.iter().filter(|c| c.is_primary_key).count() {
            0 => Err(Error::schema(&self.name, "missing primary key")),
            1 => Ok(()),
            _ => Err(Error::schema(&self.name, "more than one primary key")),
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns, bookkeeping first
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Entity-specific columns only
    pub fn entity_columns(&self) -> &[Column] {
        &self.columns[self.entity_start..]
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Comma-separated list of every column, for `SELECT`
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CREATE TABLE IF NOT EXISTS` statement
    pub fn create_table_sql(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .map(Column::definition_sql)
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {definitions}\n)",
            self.name
        )
    }

    /// Index statements: unique sync id plus one partial index per dirty flag
    pub fn create_index_sql(&self) -> Vec<String> {
        let table = &self.name;
        let mut statements = vec![format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_{SYNC_ID} ON {table}({SYNC_ID})"
        )];
        statements.extend(Destination::ALL.into_iter().map(|destination| {
            let column = destination.dirty_column();
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({LOCAL_ID} DESC) WHERE {column} = 1"
            )
        }));
        statements
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity_columns() -> Vec<Column> {
        vec![
            Column::new("name", ColumnType::Text).not_null(),
            Column::new("birth_date", ColumnType::Date),
        ]
    }

    #[test]
    fn bookkeeping_columns_include_one_dirty_flag_per_destination() {
        let names = bookkeeping_columns()
            .into_iter()
            .map(|column| column.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "local_id",
                "sync_id",
                "created",
                "updated",
                "synced",
                "dirty_debug",
                "dirty_insight",
                "deletable",
            ]
        );
    }

    #[test]
    fn table_schema_prepends_bookkeeping_columns() {
        let schema = TableSchema::new("patients", entity_columns()).unwrap();
        assert_eq!(schema.columns()[0].name, LOCAL_ID);
        assert_eq!(schema.entity_columns().len(), 2);
        assert_eq!(schema.entity_columns()[0].name, "name");
        assert!(schema.column("dirty_insight").is_some());
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let error = TableSchema::new(
            "patients",
            vec![
                Column::new("name", ColumnType::Text),
                Column::new("NAME", ColumnType::Text),
            ],
        )
        .unwrap_err();
        assert!(error.to_string().contains("duplicate column"));
    }

    #[test]
    fn entity_column_shadowing_bookkeeping_is_rejected() {
        let error =
            TableSchema::new("patients", vec![Column::new("updated", ColumnType::Text)])
                .unwrap_err();
        assert!(matches!(error, Error::Schema { .. }));
    }

    #[test]
    fn second_primary_key_is_rejected() {
        let error = TableSchema::new(
            "patients",
            vec![Column::new("code", ColumnType::Text).primary_key()],
        )
        .unwrap_err();
        assert!(error.to_string().contains("more than one primary key"));
    }

    #[test]
    fn auto_increment_requires_integer_primary_key() {
        let error = TableSchema::new(
            "patients",
            vec![Column::new("counter", ColumnType::Integer).auto_increment()],
        )
        .unwrap_err();
        assert!(error.to_string().contains("auto-increment"));
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        assert!(TableSchema::new("bad name", vec![]).is_err());
        assert!(TableSchema::new("ok", vec![Column::new("1st", ColumnType::Text)]).is_err());
    }

    #[test]
    fn create_table_sql_renders_flags() {
        let schema = TableSchema::new("patients", entity_columns()).unwrap();
        let sql = schema.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS patients ("));
        assert!(sql.contains("local_id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("dirty_debug INTEGER NOT NULL DEFAULT 1"));
        assert!(sql.contains("deletable INTEGER NOT NULL DEFAULT 0"));
        assert!(sql.contains("name TEXT NOT NULL"));
        assert!(sql.contains("birth_date TEXT"));
    }

    #[test]
    fn index_sql_covers_sync_id_and_dirty_flags() {
        let schema = TableSchema::new("patients", entity_columns()).unwrap();
        let statements = schema.create_index_sql();
        assert_eq!(statements.len(), 1 + Destination::COUNT);
        assert!(statements[0].contains("UNIQUE INDEX"));
        assert!(statements
            .iter()
            .any(|sql| sql.contains("WHERE dirty_insight = 1")));
    }
}
