//! Per-destination sync worker

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::remote::{PushError, RemoteSink};
use super::source::SyncSource;
use crate::db::AckOutcome;
use crate::error::Result;
use crate::models::Destination;
use crate::util::compact_text;

/// Counters for one cycle of one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Pushes started
    pub attempted: usize,
    /// Acks honored (flag cleared)
    pub acknowledged: usize,
    /// Records physically removed after their delete was acknowledged
    pub retired: usize,
    /// Acks discarded because the record changed meanwhile
    pub stale: usize,
    /// Pushes that failed, were rejected, or timed out
    pub failed: usize,
    /// Set when the destination looked unreachable and the cycle stopped early
    pub aborted: bool,
    /// Some table returned a full batch, so more records may be waiting
    pub saturated: bool,
}

impl CycleReport {
    /// True when the cycle pushed something but nothing got through
    pub const fn is_failure(&self) -> bool {
        self.failed > 0 && self.acknowledged == 0
    }
}

/// Drives one destination's dirty records to convergence.
///
/// A worker only ever touches its own destination's dirty flag, so workers
/// for different destinations never wait on each other.
pub struct SyncWorker<R> {
    destination: Destination,
    remote: R,
    sources: Vec<Arc<dyn SyncSource>>,
    batch_size: usize,
    push_timeout: Duration,
}

impl<R: RemoteSink> SyncWorker<R> {
    pub fn new(
        destination: Destination,
        remote: R,
        sources: Vec<Arc<dyn SyncSource>>,
        batch_size: usize,
        push_timeout: Duration,
    ) -> Self {
        Self {
            destination,
            remote,
            sources,
            batch_size,
            push_timeout,
        }
    }

    pub const fn destination(&self) -> Destination {
        self.destination
    }

    /// Records still waiting for this destination, across all tables
    pub fn pending(&self) -> Result<usize> {
        self.sources
            .iter()
            .map(|source| source.pending_count(self.destination))
            .sum()
    }

    /// Push one batch per table and apply the acknowledgements.
    ///
    /// Push failures leave records dirty and are only counted. Store errors
    /// abort the cycle and are returned.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let destination = self.destination;
        let mut report = CycleReport::default();

        'sources: for source in &self.sources {
            let batch = source.dirty_batch(destination, self.batch_size)?;
            if self.batch_size > 0 && batch.len() >= self.batch_size {
                report.saturated = true;
            }

            for pending in batch {
                report.attempted += 1;
                let result =
                    tokio::time::timeout(self.push_timeout, self.remote.push(destination, &pending.payload))
                        .await
                        .unwrap_or(Err(PushError::Timeout(self.push_timeout)));

                match result {
                    Ok(ack) => {
                        let outcome = source.apply_ack(
                            destination,
                            pending.local_id,
                            pending.observed_updated,
                            ack.assigned_sync_id,
                        )?;
                        match outcome {
                            AckOutcome::Applied => report.acknowledged += 1,
                            AckOutcome::Retired => {
                                report.acknowledged += 1;
                                report.retired += 1;
                            }
                            // Missing means the row is already gone; nothing left to clear
                            AckOutcome::Stale | AckOutcome::Missing => report.stale += 1,
                        }
                    }
                    Err(error) => {
                        report.failed += 1;
                        tracing::warn!(
                            "Push of {} record {} to {destination} failed: {}",
                            source.table(),
                            pending.local_id,
                            compact_text(&error.to_string())
                        );
                        if error.is_unreachable() {
                            report.aborted = true;
                            break 'sources;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "Sync cycle for {destination}: attempted={} acknowledged={} retired={} stale={} failed={}",
            report.attempted,
            report.acknowledged,
            report.retired,
            report.stale,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, RecordStore};
    use crate::models::{Customer, SyncId};
    use crate::sync::remote::{PushAck, PushPayload};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Remote that answers from a script, then accepts everything
    #[derive(Default)]
    struct ScriptedRemote {
        script: Mutex<VecDeque<std::result::Result<PushAck, PushError>>>,
        received: Mutex<Vec<PushPayload>>,
        delay: Option<Duration>,
    }

    impl ScriptedRemote {
        fn with_script(script: Vec<std::result::Result<PushAck, PushError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            }
        }
    }

    impl RemoteSink for ScriptedRemote {
        async fn push(
            &self,
            _destination: Destination,
            payload: &PushPayload,
        ) -> std::result::Result<PushAck, PushError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.received.lock().push(payload.clone());
            let next = self.script.lock().pop_front();
            next.unwrap_or(Ok(PushAck::accepted()))
        }
    }

    fn setup() -> (RecordStore<Customer>, Vec<Arc<dyn SyncSource>>) {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::<Customer>::open(&db).unwrap();
        let sources: Vec<Arc<dyn SyncSource>> = vec![Arc::new(store.clone())];
        (store, sources)
    }

    fn worker<R: RemoteSink>(
        destination: Destination,
        remote: R,
        sources: Vec<Arc<dyn SyncSource>>,
    ) -> SyncWorker<R> {
        SyncWorker::new(destination, remote, sources, 10, Duration::from_secs(5))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cycle_acks_dirty_records_for_its_destination_only() {
        let (store, sources) = setup();
        store.insert(Customer::new("Ada", "Lovelace")).unwrap();
        store.insert(Customer::new("Grace", "Hopper")).unwrap();

        let remote = Arc::new(ScriptedRemote::default());
        let worker = worker(Destination::Debug, Arc::clone(&remote), sources);
        let report = worker.run_cycle().await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.acknowledged, 2);
        assert_eq!(store.pending_count(Destination::Debug).unwrap(), 0);
        assert_eq!(store.pending_count(Destination::Insight).unwrap(), 2);
        assert_eq!(remote.received.lock().len(), 2);
        assert_eq!(worker.pending().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_push_leaves_record_dirty_and_continues() {
        let (store, sources) = setup();
        store.insert(Customer::new("Ada", "Lovelace")).unwrap();
        store.insert(Customer::new("Grace", "Hopper")).unwrap();

        let remote = ScriptedRemote::with_script(vec![Err(PushError::Rejected("nope".into()))]);
        let report = worker(Destination::Insight, remote, sources)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.acknowledged, 1);
        assert!(!report.aborted);
        assert!(!report.is_failure());
        assert_eq!(store.pending_count(Destination::Insight).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn network_failure_aborts_cycle() {
        let (store, sources) = setup();
        store.insert(Customer::new("Ada", "Lovelace")).unwrap();
        store.insert(Customer::new("Grace", "Hopper")).unwrap();

        let remote = ScriptedRemote::with_script(vec![Err(PushError::Network("offline".into()))]);
        let report = worker(Destination::Debug, remote, sources)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.attempted, 1);
        assert!(report.aborted);
        assert!(report.is_failure());
        assert_eq!(store.pending_count(Destination::Debug).unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_push_times_out_and_stays_dirty() {
        let (store, sources) = setup();
        store.insert(Customer::new("Ada", "Lovelace")).unwrap();

        let remote = ScriptedRemote {
            delay: Some(Duration::from_millis(200)),
            ..ScriptedRemote::default()
        };
        let worker = SyncWorker::new(
            Destination::Debug,
            remote,
            sources,
            10,
            Duration::from_millis(20),
        );
        let report = worker.run_cycle().await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(report.aborted);
        assert_eq!(store.pending_count(Destination::Debug).unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_batch_marks_cycle_saturated() {
        let (store, sources) = setup();
        for n in 0..3 {
            store
                .insert(Customer::new(format!("Patient{n}"), "Test"))
                .unwrap();
        }

        let worker = SyncWorker::new(
            Destination::Debug,
            ScriptedRemote::default(),
            sources,
            2,
            Duration::from_secs(5),
        );
        let first = worker.run_cycle().await.unwrap();
        assert!(first.saturated);
        assert_eq!(first.acknowledged, 2);

        let second = worker.run_cycle().await.unwrap();
        assert!(!second.saturated);
        assert_eq!(second.acknowledged, 1);
        assert_eq!(worker.pending().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_batch_size_is_never_saturated() {
        let (store, sources) = setup();
        store.insert(Customer::new("Ada", "Lovelace")).unwrap();

        let worker = SyncWorker::new(
            Destination::Debug,
            ScriptedRemote::default(),
            sources,
            0,
            Duration::from_secs(5),
        );
        let report = worker.run_cycle().await.unwrap();
        assert!(!report.saturated);
        assert_eq!(report.attempted, 0);
        assert_eq!(worker.pending().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn assigned_sync_id_does_not_replace_local_identity() {
        let (store, sources) = setup();
        let record = store.insert(Customer::new("Ada", "Lovelace")).unwrap();

        let remote = ScriptedRemote::with_script(vec![Ok(PushAck::with_sync_id(SyncId::new()))]);
        worker(Destination::Insight, remote, sources)
            .run_cycle()
            .await
            .unwrap();

        let after = store.get(record.local_id()).unwrap().unwrap();
        assert_eq!(after.sync_id(), record.sync_id());
        assert!(!after.is_dirty(Destination::Insight));
    }
}
