//! Owns the sync workers and the write path into the record stores.
//!
//! Every mutation made through the coordinator marks all destinations dirty
//! and wakes every worker. Workers run on their own tokio tasks and report
//! progress through a watch channel per destination.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::remote::RemoteSink;
use super::source::SyncSource;
use super::worker::{CycleReport, SyncWorker};
use crate::config::SyncSettings;
use crate::db::{Database, RecordStore};
use crate::error::{Error, Result};
use crate::models::{Destination, Entity, LocalId, Record, SyncId};
use crate::state::WorkerState;
use crate::util::{compact_text, now_millis};

/// Progress of one destination, published after every state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub destination: Destination,
    pub state: WorkerState,
    /// Records dirty for this destination after the last cycle
    pub pending: usize,
    /// Cycles in a row that made no progress
    pub consecutive_failures: u32,
    pub last_report: Option<CycleReport>,
    /// Unix ms of the last cycle that got something through or had nothing to do
    pub last_success_at: Option<i64>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    fn new(destination: Destination, pending: usize) -> Self {
        Self {
            destination,
            state: WorkerState::Idle,
            pending,
            consecutive_failures: 0,
            last_report: None,
            last_success_at: None,
            last_error: None,
        }
    }
}

/// Delay before the next cycle after `failures` unproductive cycles in a row
pub fn backoff_delay(interval: Duration, failures: u32, max_backoff: Duration) -> Duration {
    if failures == 0 {
        return interval;
    }
    interval
        .checked_mul(1_u32 << failures.min(31))
        .map_or(max_backoff, |delay| delay.min(max_backoff))
}

type SpawnWorker = Box<dyn FnOnce(Vec<Arc<dyn SyncSource>>, WorkerContext) -> JoinHandle<()> + Send>;

struct PendingWorker {
    destination: Destination,
    spawn: SpawnWorker,
}

struct WorkerContext {
    trigger: Arc<Notify>,
    status: watch::Sender<SyncStatus>,
    shutdown: watch::Receiver<bool>,
    interval: Duration,
    max_backoff: Duration,
}

struct WorkerHandle {
    trigger: Arc<Notify>,
    status: watch::Receiver<SyncStatus>,
    task: JoinHandle<()>,
}

type StoreMap = HashMap<&'static str, Box<dyn Any + Send + Sync>>;

/// Collects tables and destinations before the workers start
pub struct SyncCoordinatorBuilder {
    db: Database,
    settings: SyncSettings,
    sources: Vec<Arc<dyn SyncSource>>,
    stores: StoreMap,
    workers: Vec<PendingWorker>,
}

impl SyncCoordinatorBuilder {
    /// Open the store for `E` and sync its table to every destination
    pub fn register<E: Entity>(mut self) -> Result<Self> {
        if self.stores.contains_key(E::TABLE) {
            return Ok(self);
        }
        let store = RecordStore::<E>::open(&self.db)?;
        self.sources.push(Arc::new(store.clone()));
        self.stores.insert(E::TABLE, Box::new(store));
        Ok(self)
    }

    /// Attach the transport for `destination`
    #[must_use]
    pub fn destination<R: RemoteSink>(mut self, destination: Destination, remote: R) -> Self {
        let batch_size = self.settings.batch_size;
        let push_timeout = self.settings.push_timeout();
        let spawn: SpawnWorker = Box::new(move |sources, context| {
            let worker = SyncWorker::new(destination, remote, sources, batch_size, push_timeout);
            tokio::spawn(run_worker(worker, context))
        });
        self.workers.push(PendingWorker { destination, spawn });
        self
    }

    /// Spawn one task per enabled destination. Must be called inside a tokio runtime.
    pub fn start(self) -> Result<SyncCoordinator> {
        tokio::runtime::Handle::try_current().map_err(|_| {
            Error::Config("sync coordinator must be started inside a tokio runtime".into())
        })?;
        self.settings.validate()?;

        let mut seen = Vec::with_capacity(self.workers.len());
        for pending in &self.workers {
            if seen.contains(&pending.destination) {
                return Err(Error::Config(format!(
                    "destination {} attached more than once",
                    pending.destination
                )));
            }
            seen.push(pending.destination);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut workers = BTreeMap::new();

        for PendingWorker { destination, spawn } in self.workers {
            if !self.settings.is_enabled(destination) {
                tracing::info!("Sync to {destination} is disabled; not starting its worker");
                continue;
            }

            let pending = pending_for(&self.sources, destination)?;
            let (status, status_rx) = watch::channel(SyncStatus::new(destination, pending));
            let trigger = Arc::new(Notify::new());
            let context = WorkerContext {
                trigger: Arc::clone(&trigger),
                status,
                shutdown: shutdown_rx.clone(),
                interval: self.settings.interval(destination),
                max_backoff: self.settings.max_backoff(),
            };
            let task = spawn(self.sources.clone(), context);
            workers.insert(
                destination,
                WorkerHandle {
                    trigger,
                    status: status_rx,
                    task,
                },
            );
        }

        tracing::info!(
            "Sync coordinator started: {} table(s), {} worker(s)",
            self.sources.len(),
            workers.len()
        );

        Ok(SyncCoordinator {
            stores: self.stores,
            sources: self.sources,
            workers,
            shutdown,
        })
    }
}

/// Running sync engine plus the mutation API
pub struct SyncCoordinator {
    stores: StoreMap,
    sources: Vec<Arc<dyn SyncSource>>,
    workers: BTreeMap<Destination, WorkerHandle>,
    shutdown: watch::Sender<bool>,
}

impl SyncCoordinator {
    pub fn builder(db: Database, settings: SyncSettings) -> SyncCoordinatorBuilder {
        SyncCoordinatorBuilder {
            db,
            settings,
            sources: Vec::new(),
            stores: HashMap::new(),
            workers: Vec::new(),
        }
    }

    /// Store for a registered entity type
    fn store<E: Entity>(&self) -> Result<&RecordStore<E>> {
        self.stores
            .get(E::TABLE)
            .and_then(|store| store.downcast_ref::<RecordStore<E>>())
            .ok_or_else(|| {
                Error::InvalidInput(format!("table '{}' is not registered for sync", E::TABLE))
            })
    }

    pub fn insert<E: Entity>(&self, entity: E) -> Result<Record<E>> {
        let record = self.store::<E>()?.insert(entity)?;
        self.trigger_all();
        Ok(record)
    }

    pub fn insert_with_sync_id<E: Entity>(&self, sync_id: SyncId, entity: E) -> Result<Record<E>> {
        let record = self.store::<E>()?.insert_with_sync_id(sync_id, entity)?;
        self.trigger_all();
        Ok(record)
    }

    pub fn update<E: Entity>(&self, record: &Record<E>) -> Result<Record<E>> {
        let record = self.store::<E>()?.update(record)?;
        self.trigger_all();
        Ok(record)
    }

    pub fn soft_delete<E: Entity>(&self, local_id: LocalId) -> Result<Record<E>> {
        let record = self.store::<E>()?.soft_delete(local_id)?;
        self.trigger_all();
        Ok(record)
    }

    pub fn get<E: Entity>(&self, local_id: LocalId) -> Result<Option<Record<E>>> {
        self.store::<E>()?.get(local_id)
    }

    pub fn get_by_sync_id<E: Entity>(&self, sync_id: SyncId) -> Result<Option<Record<E>>> {
        self.store::<E>()?.get_by_sync_id(sync_id)
    }

    pub fn list<E: Entity>(&self, limit: usize, offset: usize) -> Result<Vec<Record<E>>> {
        self.store::<E>()?.list(limit, offset)
    }

    /// Wake one worker now. Returns false if no worker runs for `destination`.
    pub fn trigger(&self, destination: Destination) -> bool {
        self.workers.get(&destination).is_some_and(|handle| {
            handle.trigger.notify_one();
            true
        })
    }

    /// Wake every worker, e.g. after connectivity comes back
    pub fn trigger_all(&self) {
        for handle in self.workers.values() {
            handle.trigger.notify_one();
        }
    }

    /// Destinations with a running worker
    pub fn destinations(&self) -> Vec<Destination> {
        self.workers.keys().copied().collect()
    }

    /// Latest status of one destination
    pub fn status(&self, destination: Destination) -> Option<SyncStatus> {
        self.workers
            .get(&destination)
            .map(|handle| handle.status.borrow().clone())
    }

    /// Receiver that observes every status change of one destination
    pub fn subscribe(&self, destination: Destination) -> Option<watch::Receiver<SyncStatus>> {
        self.workers
            .get(&destination)
            .map(|handle| handle.status.clone())
    }

    /// Records waiting per destination, across all registered tables
    pub fn pending_counts(&self) -> Result<BTreeMap<Destination, usize>> {
        Destination::ALL
            .into_iter()
            .map(|destination| {
                pending_for(&self.sources, destination).map(|count| (destination, count))
            })
            .collect()
    }

    /// Stop every worker and wait for it to exit.
    ///
    /// A cycle already running finishes (its push completes or times out)
    /// before its worker stops.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        for (destination, handle) in self.workers {
            if let Err(error) = handle.task.await {
                tracing::error!("Sync worker for {destination} ended abnormally: {error}");
            }
        }
        tracing::info!("Sync coordinator stopped");
    }
}

fn pending_for(sources: &[Arc<dyn SyncSource>], destination: Destination) -> Result<usize> {
    sources
        .iter()
        .map(|source| source.pending_count(destination))
        .sum()
}

async fn run_worker<R: RemoteSink>(worker: SyncWorker<R>, mut context: WorkerContext) {
    let destination = worker.destination();
    let mut failures: u32 = 0;
    tracing::info!("Sync worker for {destination} started");

    loop {
        if *context.shutdown.borrow() {
            break;
        }

        context
            .status
            .send_modify(|status| status.state = WorkerState::Syncing);
        let outcome = worker.run_cycle().await;
        let pending = match worker.pending() {
            Ok(pending) => Some(pending),
            Err(error) => {
                tracing::warn!("Could not count pending {destination} records: {error}");
                None
            }
        };

        let mut run_again = false;
        match outcome {
            Ok(report) => {
                if report.is_failure() {
                    failures = failures.saturating_add(1);
                } else {
                    failures = 0;
                    run_again = report.saturated && report.failed == 0;
                }
                context.status.send_modify(|status| {
                    if let Some(pending) = pending {
                        status.pending = pending;
                    }
                    status.last_report = Some(report);
                    status.consecutive_failures = failures;
                    if failures == 0 {
                        status.last_success_at = Some(now_millis());
                        status.last_error = None;
                    }
                    status.state = if report.aborted {
                        WorkerState::Offline
                    } else if failures > 0 {
                        WorkerState::Error
                    } else if pending == Some(0) {
                        WorkerState::Synced
                    } else {
                        WorkerState::Idle
                    };
                });
            }
            Err(error) => {
                failures = failures.saturating_add(1);
                tracing::error!("Sync cycle for {destination} failed: {error}");
                let message = compact_text(&error.to_string());
                context.status.send_modify(|status| {
                    if let Some(pending) = pending {
                        status.pending = pending;
                    }
                    status.consecutive_failures = failures;
                    status.last_error = Some(message);
                    status.state = WorkerState::Error;
                });
            }
        }

        if run_again {
            continue;
        }

        let delay = backoff_delay(context.interval, failures, context.max_backoff);
        if failures > 0 {
            tracing::debug!("Sync worker for {destination} backing off for {delay:?}");
        }

        tokio::select! {
            changed = context.shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = context.trigger.notified() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    context
        .status
        .send_modify(|status| status.state = WorkerState::Stopped);
    tracing::info!("Sync worker for {destination} stopped");
}
