//! End-to-end sync flows across the record store, workers, and coordinator

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::{Notify, Semaphore};
use visus_core::models::Lifecycle;
use visus_core::sync::{PushAck, PushError, PushPayload, RemoteSink, SyncSource, SyncWorker};
use visus_core::{
    AckOutcome, Customer, Database, Destination, RecordStore, SyncCoordinator, SyncSettings,
    TestSession,
};

const WAIT: Duration = Duration::from_secs(5);

/// Remote that holds every push until the test releases it
struct GatedRemote {
    started: Notify,
    gate: Semaphore,
    received: Mutex<Vec<PushPayload>>,
}

impl GatedRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            gate: Semaphore::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    fn release(&self, pushes: usize) {
        self.gate.add_permits(pushes);
    }
}

impl RemoteSink for GatedRemote {
    async fn push(&self, _destination: Destination, payload: &PushPayload) -> Result<PushAck, PushError> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| PushError::Network("gate closed".into()))?;
        permit.forget();
        self.received.lock().push(payload.clone());
        Ok(PushAck::accepted())
    }
}

/// Remote that accepts everything immediately
struct AcceptAll;

impl RemoteSink for AcceptAll {
    async fn push(&self, _destination: Destination, _payload: &PushPayload) -> Result<PushAck, PushError> {
        Ok(PushAck::accepted())
    }
}

#[test]
fn acks_from_each_destination_progress_independently() {
    let db = Database::open_in_memory().unwrap();
    let store = RecordStore::<Customer>::open(&db).unwrap();
    let record = store.insert(Customer::new("Ada", "Lovelace")).unwrap();
    assert_eq!(record.lifecycle(), Lifecycle::Draft);

    let outcome = store
        .apply_ack(Destination::Debug, record.local_id(), record.updated(), None)
        .unwrap();
    assert_eq!(outcome, AckOutcome::Applied);

    let after_debug = store.get(record.local_id()).unwrap().unwrap();
    assert_eq!(after_debug.lifecycle(), Lifecycle::PartiallySynced);
    assert!(after_debug.meta.synced.is_some());

    // An edit before Insight answers invalidates Insight's pending ack
    let mut edit = after_debug.clone();
    edit.entity.notes = Some("allergic".into());
    let edited = store.update(&edit).unwrap();
    assert!(edited.is_dirty(Destination::Debug));
    assert!(edited.is_dirty(Destination::Insight));
    assert_eq!(
        store
            .apply_ack(Destination::Insight, record.local_id(), record.updated(), None)
            .unwrap(),
        AckOutcome::Stale
    );
    assert_eq!(edited.meta.created, record.meta.created);

    for destination in Destination::ALL {
        store
            .apply_ack(destination, edited.local_id(), edited.updated(), None)
            .unwrap();
    }
    let synced = store.get(record.local_id()).unwrap().unwrap();
    assert_eq!(synced.lifecycle(), Lifecycle::Synced);
    assert!(synced.meta.synced >= after_debug.meta.synced);
}

#[test]
fn tombstone_is_removed_only_after_every_destination_acks() {
    let db = Database::open_in_memory().unwrap();
    let store = RecordStore::<Customer>::open(&db).unwrap();
    let record = store.insert(Customer::new("Grace", "Hopper")).unwrap();
    for destination in Destination::ALL {
        store
            .apply_ack(destination, record.local_id(), record.updated(), None)
            .unwrap();
    }

    let tombstone = store.soft_delete(record.local_id()).unwrap();
    assert_eq!(tombstone.lifecycle(), Lifecycle::PendingDelete);
    assert!(store.list(10, 0).unwrap().is_empty());

    assert_eq!(
        store
            .apply_ack(Destination::Insight, record.local_id(), tombstone.updated(), None)
            .unwrap(),
        AckOutcome::Applied
    );
    assert_eq!(store.count().unwrap(), 1);

    assert_eq!(
        store
            .apply_ack(Destination::Debug, record.local_id(), tombstone.updated(), None)
            .unwrap(),
        AckOutcome::Retired
    );
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.get_by_sync_id(record.sync_id()).unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn edit_during_inflight_push_keeps_record_dirty() {
    let db = Database::open_in_memory().unwrap();
    let store = RecordStore::<Customer>::open(&db).unwrap();
    let record = store.insert(Customer::new("Ada", "Lovelace")).unwrap();

    let remote = GatedRemote::new();
    let sources: Vec<Arc<dyn SyncSource>> = vec![Arc::new(store.clone())];
    let worker = SyncWorker::new(Destination::Insight, Arc::clone(&remote), sources, 10, WAIT);
    let cycle = tokio::spawn(async move { worker.run_cycle().await });

    tokio::time::timeout(WAIT, remote.started.notified()).await.unwrap();
    let mut edited = record.clone();
    edited.entity.notes = Some("changed while pushing".into());
    let edited = store.update(&edited).unwrap();
    remote.release(1);

    let report = cycle.await.unwrap().unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.stale, 1);
    assert_eq!(report.acknowledged, 0);

    let current = store.get(record.local_id()).unwrap().unwrap();
    assert!(current.is_dirty(Destination::Insight));
    assert_eq!(current.updated(), edited.updated());
    assert_eq!(remote.received.lock()[0].updated, record.updated());
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_drains_every_registered_table() {
    let db = Database::open_in_memory().unwrap();
    let customers = RecordStore::<Customer>::open(&db).unwrap();
    let sessions = RecordStore::<TestSession>::open(&db).unwrap();

    let customer = customers.insert(Customer::new("Ada", "Lovelace")).unwrap();
    sessions
        .insert(TestSession::new(customer.sync_id(), "visual_acuity").complete(Some(80), Some(75)))
        .unwrap();

    let sources: Vec<Arc<dyn SyncSource>> =
        vec![Arc::new(customers.clone()), Arc::new(sessions.clone())];
    let worker = SyncWorker::new(Destination::Debug, AcceptAll, sources, 10, WAIT);
    let report = worker.run_cycle().await.unwrap();

    assert_eq!(report.acknowledged, 2);
    assert_eq!(customers.pending_count(Destination::Debug).unwrap(), 0);
    assert_eq!(sessions.pending_count(Destination::Debug).unwrap(), 0);
    assert_eq!(sessions.pending_count(Destination::Insight).unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_waits_for_inflight_push() {
    let remote = GatedRemote::new();
    let db = Database::open_in_memory().unwrap();
    let coordinator = SyncCoordinator::builder(db.clone(), SyncSettings::default())
        .register::<Customer>()
        .unwrap()
        .destination(Destination::Debug, Arc::clone(&remote))
        .start()
        .unwrap();

    let record = coordinator
        .insert(Customer::new("Ada", "Lovelace"))
        .unwrap();
    tokio::time::timeout(WAIT, remote.started.notified()).await.unwrap();

    let shutdown = tokio::spawn(coordinator.shutdown());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_finished());

    remote.release(1);
    tokio::time::timeout(WAIT, shutdown).await.unwrap().unwrap();

    let store = RecordStore::<Customer>::open(&db).unwrap();
    let stored = store.get(record.local_id()).unwrap().unwrap();
    assert!(!stored.is_dirty(Destination::Debug));
    assert!(stored.is_dirty(Destination::Insight));
}
