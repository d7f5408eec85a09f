//! Data models for Visus

mod customer;
mod destination;
mod entity;
mod record;
mod test_session;

pub use customer::Customer;
pub use destination::{Destination, DirtyFlags};
pub use entity::Entity;
pub use record::{Lifecycle, LocalId, Record, RecordMeta, SyncId};
pub use test_session::{TestSession, MAX_EYE_SCORE};
