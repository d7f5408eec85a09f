//! Database layer for Visus

mod connection;
mod migrations;
mod store;

pub use connection::Database;
pub use store::{AckOutcome, RecordStore};
