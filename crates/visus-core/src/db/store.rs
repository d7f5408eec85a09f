//! Generic record store
//!
//! Every mutation runs in a single transaction that writes the entity columns
//! and the bookkeeping columns together, so the two never diverge.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Destination, DirtyFlags, Entity, LocalId, Record, RecordMeta, SyncId};
use crate::schema::{TableSchema, CREATED, DELETABLE, LOCAL_ID, SYNCED, SYNC_ID, UPDATED};
use crate::util::{next_version, now_millis};

/// Result of applying one destination acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Dirty flag cleared and `synced` advanced
    Applied,
    /// Flag cleared and the record was physically removed
    Retired,
    /// The record changed after the acknowledged snapshot; still dirty
    Stale,
    /// No such record (already retired, or never existed)
    Missing,
}

/// CRUD and sync bookkeeping for one entity table
pub struct RecordStore<E: Entity> {
    db: Database,
    schema: Arc<TableSchema>,
    select_sql: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for RecordStore<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            schema: Arc::clone(&self.schema),
            select_sql: self.select_sql.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> RecordStore<E> {
    /// Open the store for `E`, registering its table on first use
    pub fn open(db: &Database) -> Result<Self> {
        let schema = db.register(TableSchema::new(E::TABLE, E::columns())?)?;
        let select_sql = format!("SELECT {} FROM {}", schema.select_list(), schema.name());
        Ok(Self {
            db: db.clone(),
            schema,
            select_sql,
            _entity: PhantomData,
        })
    }

    /// Table name
    pub fn table(&self) -> &str {
        self.schema.name()
    }

    /// Insert a new record with a freshly generated sync id
    pub fn insert(&self, entity: E) -> Result<Record<E>> {
        self.insert_with_sync_id(SyncId::new(), entity)
    }

    /// Insert a record under a caller-chosen sync id.
    ///
    /// Retrying with the same sync id returns the row created by the first
    /// attempt instead of creating a second identity.
    pub fn insert_with_sync_id(&self, sync_id: SyncId, entity: E) -> Result<Record<E>> {
        let values = self.entity_values(&entity)?;
        let now = now_millis();

        self.db.write(|tx| {
            if let Some(existing) = self.fetch_by_sync_id(tx, sync_id)? {
                tracing::debug!(
                    "Insert into {} reused existing record {} for sync id {sync_id}",
                    self.table(),
                    existing.local_id()
                );
                return Ok(existing);
            }

            let mut columns = vec![SYNC_ID, CREATED, UPDATED, DELETABLE];
            columns.extend(Destination::ALL.map(Destination::dirty_column));
            columns.extend(self.entity_column_names());

            let mut params = vec![
                Value::Text(sync_id.as_str()),
                Value::Integer(now),
                Value::Integer(now),
                Value::Integer(0),
            ];
            params.extend(Destination::ALL.map(|_| Value::Integer(1)));
            params.extend(values);

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table(),
                columns.join(", "),
                vec!["?"; columns.len()].join(", "),
            );

            tx.execute(&sql, params_from_iter(params))?;
            let local_id = tx.last_insert_rowid();
            self.fetch(tx, local_id)?
                .ok_or_else(|| Error::Database(format!("inserted row {local_id} vanished")))
        })
    }

    /// Rewrite a record's entity fields.
    ///
    /// Every destination becomes dirty regardless of which fields changed.
    pub fn update(&self, record: &Record<E>) -> Result<Record<E>> {
        let local_id = record.local_id();
        let values = self.entity_values(&record.entity)?;

        self.db.write(|tx| {
            let updated = self.next_updated(tx, local_id)?;
            let mut assignments = self
                .entity_column_names()
                .into_iter()
                .map(|name| format!("{name} = ?"))
                .collect::<Vec<_>>();
            assignments.push(format!("{UPDATED} = ?"));
            assignments.push(mark_all_dirty_sql());
            let sql = format!(
                "UPDATE {} SET {} WHERE {LOCAL_ID} = ?",
                self.table(),
                assignments.join(", "),
            );

            let mut params = values;
            params.push(Value::Integer(updated));
            params.push(Value::Integer(local_id));
            tx.execute(&sql, params_from_iter(params))?;

            self.fetch(tx, local_id)?.ok_or_else(|| self.not_found(local_id))
        })
    }

    /// Mark a record for deletion once every destination has acknowledged it.
    ///
    /// The delete intent propagates like any other change. Calling this
    /// again only advances `updated`.
    pub fn soft_delete(&self, local_id: LocalId) -> Result<Record<E>> {
        self.db.write(|tx| {
            let updated = self.next_updated(tx, local_id)?;
            tx.execute(
                &format!(
                    "UPDATE {} SET {DELETABLE} = 1, {UPDATED} = ?, {} WHERE {LOCAL_ID} = ?",
                    self.table(),
                    mark_all_dirty_sql(),
                ),
                params![updated, local_id],
            )?;

            self.fetch(tx, local_id)?.ok_or_else(|| self.not_found(local_id))
        })
    }

    /// Records with unpushed changes for `destination`, newest local id first
    pub fn find_dirty(&self, destination: Destination, limit: usize) -> Result<Vec<Record<E>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE {} = 1 ORDER BY {LOCAL_ID} DESC LIMIT ?",
                self.select_sql,
                destination.dirty_column(),
            ))?;
            let records = stmt
                .query_map(params![limit as i64], |row| self.parse_record(row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Apply a destination's acknowledgement of the version read at `observed_updated`.
    ///
    /// Honored only if the record still carries exactly that version: the
    /// destination's dirty flag is cleared and `synced` moves forward. If the
    /// record was edited after the snapshot, the ack is discarded and the
    /// record stays dirty for the next cycle. A record that ends up deletable
    /// and clean for every destination is removed in the same transaction.
    pub fn apply_ack(
        &self,
        destination: Destination,
        local_id: LocalId,
        observed_updated: i64,
        remote_sync_id: Option<SyncId>,
    ) -> Result<AckOutcome> {
        self.db.write(|tx| {
            let current = tx
                .query_row(
                    &format!(
                        "SELECT {UPDATED}, {SYNC_ID} FROM {} WHERE {LOCAL_ID} = ?",
                        self.table()
                    ),
                    params![local_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, SyncId>(1)?)),
                )
                .optional()?;

            let Some((updated, sync_id)) = current else {
                return Ok(AckOutcome::Missing);
            };

            if let Some(remote) = remote_sync_id.filter(|remote| *remote != sync_id) {
                tracing::warn!(
                    "Ignoring sync id {remote} assigned by {destination} for {} record {local_id}; keeping {sync_id}",
                    self.table()
                );
            }

            if updated != observed_updated {
                tracing::debug!(
                    "Discarding stale {destination} ack for {} record {local_id}: acked {observed_updated}, current {updated}",
                    self.table()
                );
                return Ok(AckOutcome::Stale);
            }

            let now = now_millis();
            tx.execute(
                &format!(
                    "UPDATE {} SET {} = 0, {SYNCED} = MAX(COALESCE({SYNCED}, ?1), ?1)
                     WHERE {LOCAL_ID} = ?2 AND {UPDATED} = ?3",
                    self.table(),
                    destination.dirty_column(),
                ),
                params![now, local_id, observed_updated],
            )?;

            let retired = tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {LOCAL_ID} = ? AND {DELETABLE} = 1 AND {}",
                    self.table(),
                    all_clean_sql(),
                ),
                params![local_id],
            )?;

            if retired > 0 {
                tracing::debug!("Retired {} record {local_id} ({sync_id})", self.table());
                Ok(AckOutcome::Retired)
            } else {
                Ok(AckOutcome::Applied)
            }
        })
    }

    /// Look up a record by local id
    pub fn get(&self, local_id: LocalId) -> Result<Option<Record<E>>> {
        self.db.read(|conn| self.fetch(conn, local_id))
    }

    /// Look up a record by sync id
    pub fn get_by_sync_id(&self, sync_id: SyncId) -> Result<Option<Record<E>>> {
        self.db.read(|conn| self.fetch_by_sync_id(conn, sync_id))
    }

    /// List live records (not pending deletion), newest first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<Record<E>>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE {DELETABLE} = 0 ORDER BY {LOCAL_ID} DESC LIMIT ? OFFSET ?",
                self.select_sql,
            ))?;
            let records = stmt
                .query_map(params![limit as i64, offset as i64], |row| {
                    self.parse_record(row)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Number of records still dirty for `destination`
    pub fn pending_count(&self, destination: Destination) -> Result<usize> {
        self.count_where(&format!("{} = 1", destination.dirty_column()))
    }

    /// Number of rows physically present, including pending deletions
    pub fn count(&self) -> Result<usize> {
        self.count_where("1 = 1")
    }

    fn count_where(&self, predicate: &str) -> Result<usize> {
        self.db.read(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {predicate}", self.table()),
                [],
                |row| row.get(0),
            )?;
            usize::try_from(count).map_err(|error| Error::Database(error.to_string()))
        })
    }

    fn entity_values(&self, entity: &E) -> Result<Vec<Value>> {
        entity.validate()?;
        let values = entity.to_values();
        let expected = self.schema.entity_columns().len();
        if values.len() != expected {
            return Err(Error::InvalidInput(format!(
                "{} produced {} values for {expected} columns",
                self.table(),
                values.len()
            )));
        }
        Ok(values)
    }

    fn entity_column_names(&self) -> Vec<&str> {
        self.schema
            .entity_columns()
            .iter()
            .map(|column| column.name.as_str())
            .collect()
    }

    /// Version for the next mutation of `local_id`, or `NotFound`
    fn next_updated(&self, conn: &Connection, local_id: LocalId) -> Result<i64> {
        let previous: Option<i64> = conn
            .query_row(
                &format!(
                    "SELECT {UPDATED} FROM {} WHERE {LOCAL_ID} = ?",
                    self.table()
                ),
                params![local_id],
                |row| row.get(0),
            )
            .optional()?;

        previous
            .map(|previous| next_version(previous, now_millis()))
            .ok_or_else(|| self.not_found(local_id))
    }

    fn fetch(&self, conn: &Connection, local_id: LocalId) -> Result<Option<Record<E>>> {
        let result = conn.query_row(
            &format!("{} WHERE {LOCAL_ID} = ?", self.select_sql),
            params![local_id],
            |row| self.parse_record(row),
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_by_sync_id(&self, conn: &Connection, sync_id: SyncId) -> Result<Option<Record<E>>> {
        let result = conn.query_row(
            &format!("{} WHERE {SYNC_ID} = ?", self.select_sql),
            params![sync_id],
            |row| self.parse_record(row),
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse a record from a row selected with `select_sql`
    fn parse_record(&self, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record<E>> {
        let mut dirty = DirtyFlags::all_clean();
        for destination in Destination::ALL {
            dirty.set(destination, row.get(destination.dirty_column())?);
        }

        Ok(Record {
            meta: RecordMeta {
                local_id: row.get(LOCAL_ID)?,
                sync_id: row.get(SYNC_ID)?,
                created: row.get(CREATED)?,
                updated: row.get(UPDATED)?,
                synced: row.get(SYNCED)?,
                dirty,
                deletable: row.get(DELETABLE)?,
            },
            entity: E::from_row(row)?,
        })
    }

    fn not_found(&self, local_id: LocalId) -> Error {
        Error::NotFound {
            table: self.table().to_string(),
            local_id,
        }
    }
}

fn mark_all_dirty_sql() -> String {
    Destination::ALL
        .map(|destination| format!("{} = 1", destination.dirty_column()))
        .join(", ")
}

fn all_clean_sql() -> String {
    Destination::ALL
        .map(|destination| format!("{} = 0", destination.dirty_column()))
        .join(" AND ")
}
