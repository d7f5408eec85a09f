use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use visus_core::config::{load_sync_settings, SyncSettings};
use visus_core::models::{Customer, Lifecycle, Record, TestSession};
use visus_core::sync::{PendingPush, SyncSource};
use visus_core::{AckOutcome, Database, Entity, RecordStore};

use crate::cli::TableArg;
use crate::error::CliError;

impl TableArg {
    pub const ALL: [Self; 2] = [Self::Customers, Self::Sessions];

    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Customers => Customer::TABLE,
            Self::Sessions => TestSession::TABLE,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DirtyItem {
    pub local_id: i64,
    pub sync_id: String,
    pub updated: i64,
    pub deleted: bool,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("VISUS_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visus")
        .join("visus.db")
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path)?)
}

/// Settings from `path` (defaults when absent) with `VISUS_SYNC_*` overrides
pub fn load_settings(path: Option<&Path>) -> Result<SyncSettings, CliError> {
    let settings = match path {
        Some(path) => load_sync_settings(path)?,
        None => SyncSettings::default(),
    };
    Ok(settings.with_env_overrides()?)
}

/// Type-erased store for one table
pub fn open_source(db: &Database, table: TableArg) -> Result<Arc<dyn SyncSource>, CliError> {
    let source: Arc<dyn SyncSource> = match table {
        TableArg::Customers => Arc::new(RecordStore::<Customer>::open(db)?),
        TableArg::Sessions => Arc::new(RecordStore::<TestSession>::open(db)?),
    };
    Ok(source)
}

pub fn open_all_sources(db: &Database) -> Result<Vec<Arc<dyn SyncSource>>, CliError> {
    TableArg::ALL
        .into_iter()
        .map(|table| open_source(db, table))
        .collect()
}

pub fn dirty_item(pending: &PendingPush) -> DirtyItem {
    DirtyItem {
        local_id: pending.local_id,
        sync_id: pending.payload.sync_id.to_string(),
        updated: pending.observed_updated,
        deleted: pending.payload.deleted,
    }
}

pub fn format_dirty_lines(batch: &[PendingPush]) -> Vec<String> {
    batch
        .iter()
        .map(|pending| {
            let marker = if pending.payload.deleted { "  deleted" } else { "" };
            format!(
                "{:>6}  {}  updated={}{marker}",
                pending.local_id, pending.payload.sync_id, pending.observed_updated
            )
        })
        .collect()
}

pub fn format_customer_lines(records: &[Record<Customer>]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            format!(
                "{:>6}  {:<30}  {:<16}  {}",
                record.local_id(),
                record.entity.display_name(),
                lifecycle_label(record.lifecycle()),
                format_relative_time(record.updated(), now_ms)
            )
        })
        .collect()
}

pub fn format_session_lines(records: &[Record<TestSession>]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let session = &record.entity;
            let scores = format!(
                "L={} R={}",
                format_score(session.left_eye_score),
                format_score(session.right_eye_score)
            );
            format!(
                "{:>6}  {:<16}  {:<11}  {}  {:<16}  customer={}",
                record.local_id(),
                session.test_kind,
                scores,
                format_sync_timestamp(session.performed_at),
                lifecycle_label(record.lifecycle()),
                session.customer_sync_id
            )
        })
        .collect()
}

fn format_score(score: Option<i64>) -> String {
    score.map_or_else(|| "-".to_string(), |score| score.to_string())
}

pub const fn lifecycle_label(lifecycle: Lifecycle) -> &'static str {
    match lifecycle {
        Lifecycle::Draft => "draft",
        Lifecycle::Modified => "modified",
        Lifecycle::PartiallySynced => "partially synced",
        Lifecycle::Synced => "synced",
        Lifecycle::PendingDelete => "pending delete",
    }
}

pub const fn describe_ack_outcome(outcome: AckOutcome) -> &'static str {
    match outcome {
        AckOutcome::Applied => "applied",
        AckOutcome::Retired => "applied; record removed",
        AckOutcome::Stale => "stale; record changed since that version and stays dirty",
        AckOutcome::Missing => "no such record",
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Coarse age of `timestamp_ms` relative to `now_ms`, e.g. `3h ago`
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let age = TimeDelta::milliseconds(now_ms.saturating_sub(timestamp_ms).max(0));
    let days = age.num_days();
    match (days, age.num_hours(), age.num_minutes()) {
        (_, _, 0) => "just now".to_string(),
        (_, 0, minutes) => format!("{minutes}m ago"),
        (0, hours, _) => format!("{hours}h ago"),
        (1..=6, _, _) => format!("{days}d ago"),
        (7..=29, _, _) => format!("{}w ago", age.num_weeks()),
        (30..=364, _, _) => format!("{}mo ago", days / 30),
        _ => format!("{}y ago", days / 365),
    }
}

pub fn normalize_required(value: &str, field: &'static str) -> Result<String, CliError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyField(field))
    } else {
        Ok(trimmed.to_string())
    }
}
