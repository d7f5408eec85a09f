//! Type-erased view of a record store, as seen by sync workers

use super::remote::PushPayload;
use crate::db::{AckOutcome, RecordStore};
use crate::error::Result;
use crate::models::{Destination, Entity, LocalId, SyncId};

/// One record selected for a push, with the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPush {
    pub local_id: LocalId,
    /// `updated` at read time; the acknowledgement is checked against it
    pub observed_updated: i64,
    pub payload: PushPayload,
}

/// A table a worker can drain.
///
/// Workers may only read snapshots and apply acknowledgements; every other
/// write goes through the record store.
pub trait SyncSource: Send + Sync {
    fn table(&self) -> &str;

    /// Snapshot of up to `limit` records dirty for `destination`
    fn dirty_batch(&self, destination: Destination, limit: usize) -> Result<Vec<PendingPush>>;

    fn apply_ack(
        &self,
        destination: Destination,
        local_id: LocalId,
        observed_updated: i64,
        remote_sync_id: Option<SyncId>,
    ) -> Result<AckOutcome>;

    fn pending_count(&self, destination: Destination) -> Result<usize>;
}

impl<E: Entity> SyncSource for RecordStore<E> {
    fn table(&self) -> &str {
        Self::table(self)
    }

    fn dirty_batch(&self, destination: Destination, limit: usize) -> Result<Vec<PendingPush>> {
        self.find_dirty(destination, limit)?
            .iter()
            .map(|record| {
                PushPayload::from_record(Self::table(self), record).map(|payload| PendingPush {
                    local_id: record.local_id(),
                    observed_updated: record.updated(),
                    payload,
                })
            })
            .collect()
    }

    fn apply_ack(
        &self,
        destination: Destination,
        local_id: LocalId,
        observed_updated: i64,
        remote_sync_id: Option<SyncId>,
    ) -> Result<AckOutcome> {
        Self::apply_ack(self, destination, local_id, observed_updated, remote_sync_id)
    }

    fn pending_count(&self, destination: Destination) -> Result<usize> {
        Self::pending_count(self, destination)
    }
}
