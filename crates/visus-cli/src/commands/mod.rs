pub mod ack;
pub mod add;
pub mod common;
pub mod delete;
pub mod dirty;
pub mod drain;
pub mod list;
pub mod payload;
pub mod status;
