//! Per-destination sync engine
//!
//! A [`SyncWorker`] drains one destination's dirty records through a
//! [`RemoteSink`]; the [`SyncCoordinator`] schedules workers and owns the
//! mutation API.

mod coordinator;
mod remote;
mod source;
mod worker;

pub use coordinator::{backoff_delay, SyncCoordinator, SyncCoordinatorBuilder, SyncStatus};
pub use remote::{PushAck, PushError, PushPayload, RemoteSink};
pub use source::{PendingPush, SyncSource};
pub use worker::{CycleReport, SyncWorker};
