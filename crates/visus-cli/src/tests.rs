use std::path::{Path, PathBuf};

use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use visus_core::{AckOutcome, Customer, Database, Destination, RecordStore, SyncId, TestSession};

use crate::cli::{Cli, Commands, TableArg};
use crate::commands::ack::apply_manual_ack;
use crate::commands::add::{run_add_customer, run_add_session};
use crate::commands::common::{
    default_db_path, describe_ack_outcome, format_dirty_lines, format_relative_time,
    format_sync_timestamp, load_settings, normalize_required, open_source, resolve_db_path,
};
use crate::commands::delete::run_delete;
use crate::commands::drain::run_drain;
use crate::commands::status::collect_status;
use crate::error::CliError;

fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("visus.db");
    (dir, path)
}

fn customers(path: &Path) -> RecordStore<Customer> {
    RecordStore::open(&Database::open(path).unwrap()).unwrap()
}

#[test]
fn explicit_db_path_wins() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn default_db_path_lives_under_visus_dir() {
    let path = default_db_path();
    assert!(path.ends_with("visus/visus.db"));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now + 5_000, now), "just now");

    let day = 24 * 60 * 60_000;
    let later = 1_000 * day;
    assert_eq!(format_relative_time(later - 3 * day, later), "3d ago");
    assert_eq!(format_relative_time(later - 15 * day, later), "2w ago");
    assert_eq!(format_relative_time(later - 90 * day, later), "3mo ago");
    assert_eq!(format_relative_time(later - 800 * day, later), "2y ago");
}

#[test]
fn format_sync_timestamp_renders_utc() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn normalize_required_rejects_blank() {
    assert_eq!(normalize_required("  Ada ", "First name").unwrap(), "Ada");
    assert!(matches!(
        normalize_required(" \t", "First name"),
        Err(CliError::EmptyField("First name"))
    ));
}

#[test]
fn parses_dirty_command() {
    let cli = Cli::try_parse_from(["visus", "dirty", "insight", "sessions", "--limit", "3", "--json"])
        .unwrap();
    match cli.command {
        Commands::Dirty {
            destination,
            table,
            limit,
            json,
        } => {
            assert_eq!(destination, Destination::Insight);
            assert_eq!(table, TableArg::Sessions);
            assert_eq!(limit, 3);
            assert!(json);
        }
        _ => panic!("expected dirty command"),
    }
}

#[test]
fn rejects_unknown_destination() {
    assert!(Cli::try_parse_from(["visus", "payload", "billing", "customers"]).is_err());
}

#[test]
fn parses_add_session_with_sync_id() {
    let sync_id = SyncId::new();
    let sync_id_text = sync_id.to_string();
    let cli = Cli::try_parse_from([
        "visus",
        "add-session",
        "--customer",
        sync_id_text.as_str(),
        "--kind",
        "visual_acuity",
        "--left",
        "80",
        "--completed",
    ])
    .unwrap();
    match cli.command {
        Commands::AddSession {
            customer,
            left,
            right,
            completed,
            ..
        } => {
            assert_eq!(customer, sync_id);
            assert_eq!(left, Some(80));
            assert_eq!(right, None);
            assert!(completed);
        }
        _ => panic!("expected add-session command"),
    }
}

#[test]
fn add_customer_persists_dirty_record() {
    let (_dir, path) = temp_db();
    run_add_customer(" Ada ", "Lovelace", None, Some("ada@example.com"), None, &path).unwrap();

    let records = customers(&path).list(10, 0).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity.first_name, "Ada");
    assert!(records[0].is_dirty(Destination::Debug));
    assert!(records[0].is_dirty(Destination::Insight));
}

#[test]
fn add_session_requires_known_customer() {
    let (_dir, path) = temp_db();
    let error = run_add_session(SyncId::new(), "visual_acuity", None, None, false, &path).unwrap_err();
    assert!(matches!(error, CliError::CustomerNotFound(_)));

    let customer = customers(&path)
        .insert(Customer::new("Ada", "Lovelace"))
        .unwrap();
    run_add_session(customer.sync_id(), "visual_acuity", Some(90), Some(85), true, &path).unwrap();

    let sessions = RecordStore::<TestSession>::open(&Database::open(&path).unwrap()).unwrap();
    let stored = sessions.list(10, 0).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].entity.customer_sync_id, customer.sync_id());
    assert!(stored[0].entity.completed);
}

#[test]
fn manual_ack_honors_version_check() {
    let (_dir, path) = temp_db();
    let record = customers(&path)
        .insert(Customer::new("Ada", "Lovelace"))
        .unwrap();

    let stale = apply_manual_ack(
        Destination::Debug,
        TableArg::Customers,
        record.local_id(),
        record.updated() - 1,
        &path,
    )
    .unwrap();
    assert_eq!(stale, AckOutcome::Stale);

    let applied = apply_manual_ack(
        Destination::Debug,
        TableArg::Customers,
        record.local_id(),
        record.updated(),
        &path,
    )
    .unwrap();
    assert_eq!(applied, AckOutcome::Applied);
    assert_eq!(describe_ack_outcome(applied), "applied");

    let statuses = collect_status(&path).unwrap();
    let customers_status = statuses
        .iter()
        .find(|status| status.table == "customers")
        .unwrap();
    assert_eq!(customers_status.records, 1);
    assert_eq!(customers_status.pending[&Destination::Debug], 0);
    assert_eq!(customers_status.pending[&Destination::Insight], 1);
}

#[test]
fn delete_then_dirty_view_marks_deleted() {
    let (_dir, path) = temp_db();
    let record = customers(&path)
        .insert(Customer::new("Ada", "Lovelace"))
        .unwrap();
    run_delete(TableArg::Customers, record.local_id(), &path).unwrap();

    let db = Database::open(&path).unwrap();
    let batch = open_source(&db, TableArg::Customers)
        .unwrap()
        .dirty_batch(Destination::Insight, 10)
        .unwrap();
    let lines = format_dirty_lines(&batch);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("deleted"));
}

#[test]
fn delete_unknown_record_fails() {
    let (_dir, path) = temp_db();
    let error = run_delete(TableArg::Sessions, 42, &path).unwrap_err();
    assert!(matches!(error, CliError::Core(ref core) if core.is_not_found()));
}

#[test]
fn load_settings_defaults_without_file() {
    let settings = load_settings(None).unwrap();
    assert!(settings.batch_size > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_acknowledges_everything_for_one_destination() {
    let (_dir, path) = temp_db();
    let store = customers(&path);
    store.insert(Customer::new("Ada", "Lovelace")).unwrap();
    store.insert(Customer::new("Grace", "Hopper")).unwrap();

    run_drain(Destination::Debug, Some(10), None, &path)
        .await
        .unwrap();

    assert_eq!(store.pending_count(Destination::Debug).unwrap(), 0);
    assert_eq!(store.pending_count(Destination::Insight).unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_rejects_zero_batch() {
    let (_dir, path) = temp_db();
    let error = run_drain(Destination::Debug, Some(0), None, &path)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::Core(visus_core::Error::Config(_))));
}
