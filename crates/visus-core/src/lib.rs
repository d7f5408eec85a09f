//! visus-core - Core library for Visus
//!
//! Local-first storage for clinical test records. Every table carries sync
//! bookkeeping next to its entity columns, and one sync worker per
//! destination pushes changes and applies acknowledgements with
//! compare-and-swap on the record version.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod state;
pub mod sync;
pub mod util;

pub use config::{DestinationSettings, SyncSettings};
pub use db::{AckOutcome, Database, RecordStore};
pub use error::{Error, Result};
pub use models::{Customer, Destination, Entity, Record, SyncId, TestSession};
pub use state::WorkerState;
pub use sync::{SyncCoordinator, SyncStatus};
