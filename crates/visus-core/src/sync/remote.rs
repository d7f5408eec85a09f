//! Remote push interface implemented by transport clients

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;
use crate::models::{Destination, Entity, Record, SyncId};

/// Serialized form of one record as sent to a destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub table: String,
    pub sync_id: SyncId,
    pub created: i64,
    /// Version being pushed
    pub updated: i64,
    /// Delete intent: the destination should drop its copy
    pub deleted: bool,
    /// Entity fields
    pub fields: serde_json::Value,
}

impl PushPayload {
    pub fn from_record<E: Entity>(table: &str, record: &Record<E>) -> Result<Self> {
        Ok(Self {
            table: table.to_string(),
            sync_id: record.sync_id(),
            created: record.meta.created,
            updated: record.updated(),
            deleted: record.meta.deletable,
            fields: serde_json::to_value(&record.entity)?,
        })
    }
}

/// Successful acknowledgement from a destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    /// Identifier the destination assigned, if it assigns its own
    #[serde(default)]
    pub assigned_sync_id: Option<SyncId>,
}

impl PushAck {
    /// Plain acknowledgement with no assigned id
    pub const fn accepted() -> Self {
        Self {
            assigned_sync_id: None,
        }
    }

    pub const fn with_sync_id(sync_id: SyncId) -> Self {
        Self {
            assigned_sync_id: Some(sync_id),
        }
    }
}

/// A push that did not produce an acknowledgement.
///
/// Never fatal: the record stays dirty and is pushed again on a later cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// The destination could not be reached
    #[error("Network error: {0}")]
    Network(String),
    /// The destination refused this record
    #[error("Rejected by remote: {0}")]
    Rejected(String),
    /// No answer within the push timeout
    #[error("Push timed out after {0:?}")]
    Timeout(Duration),
}

impl PushError {
    /// Whether the destination itself looks unreachable, as opposed to one
    /// record being refused
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Transport for one destination.
pub trait RemoteSink: Send + Sync + 'static {
    /// Push one record; resolves to an acknowledgement or a failure.
    fn push(
        &self,
        destination: Destination,
        payload: &PushPayload,
    ) -> impl Future<Output = std::result::Result<PushAck, PushError>> + Send;
}

impl<R: RemoteSink> RemoteSink for Arc<R> {
    fn push(
        &self,
        destination: Destination,
        payload: &PushPayload,
    ) -> impl Future<Output = std::result::Result<PushAck, PushError>> + Send {
        (**self).push(destination, payload)
    }
}
