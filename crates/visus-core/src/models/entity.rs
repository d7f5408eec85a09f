//! Entity authoring interface

use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;

use crate::error::Result;
use crate::schema::Column;

/// A domain type persisted in its own synced table.
///
/// Implementors declare only their own columns; the record store attaches the
/// bookkeeping columns. `to_values` must yield one value per entry of
/// `columns`, in the same order.
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Backing table name
    const TABLE: &'static str;

    /// Entity-specific column declarations
    fn columns() -> Vec<Column>;

    /// Column values in declaration order
    fn to_values(&self) -> Vec<Value>;

    /// Read the entity fields from a row, by column name
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Reject values that must never reach the store
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

pub(crate) fn optional_integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub(crate) fn boolean(value: bool) -> Value {
    Value::Integer(i64::from(value))
}
