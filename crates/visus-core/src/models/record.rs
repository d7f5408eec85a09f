//! Record model: bookkeeping attributes shared by every table

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Destination, DirtyFlags};

/// Device-local primary key
pub type LocalId = i64;

/// A globally-unique record identifier, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncId(Uuid);

impl SyncId {
    /// Create a new unique sync ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl ToSql for SyncId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SyncId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Where a record is in its sync lifecycle, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Never acknowledged by any destination
    Draft,
    /// Every destination dirty again after an earlier sync
    Modified,
    /// Some destinations clean, some dirty
    PartiallySynced,
    /// Every destination clean
    Synced,
    /// Marked deletable; waiting for every destination to acknowledge
    PendingDelete,
}

/// Bookkeeping attributes present on every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub local_id: LocalId,
    pub sync_id: SyncId,
    /// Insert timestamp (Unix ms)
    pub created: i64,
    /// Last local mutation (Unix ms); the version acknowledged against
    pub updated: i64,
    /// Latest acknowledgement from any destination (Unix ms)
    pub synced: Option<i64>,
    pub dirty: DirtyFlags,
    pub deletable: bool,
}

impl RecordMeta {
    pub const fn is_dirty(&self, destination: Destination) -> bool {
        self.dirty.is_dirty(destination)
    }

    /// Whether the store may physically remove this row
    pub fn is_retirable(&self) -> bool {
        self.deletable && self.dirty.is_clean()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.deletable {
            Lifecycle::PendingDelete
        } else if self.dirty.is_clean() {
            Lifecycle::Synced
        } else if self.dirty.is_all_dirty() {
            if self.synced.is_none() {
                Lifecycle::Draft
            } else {
                Lifecycle::Modified
            }
        } else {
            Lifecycle::PartiallySynced
        }
    }
}

/// One persisted row: bookkeeping plus the entity value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<E> {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub entity: E,
}

impl<E> Record<E> {
    pub const fn local_id(&self) -> LocalId {
        self.meta.local_id
    }

    pub const fn sync_id(&self) -> SyncId {
        self.meta.sync_id
    }

    pub const fn updated(&self) -> i64 {
        self.meta.updated
    }

    pub const fn is_dirty(&self, destination: Destination) -> bool {
        self.meta.is_dirty(destination)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.meta.lifecycle()
    }
}
