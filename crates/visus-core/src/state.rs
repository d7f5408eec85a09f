//! Shared sync state types.

use serde::{Deserialize, Serialize};

/// Coarse state of one destination's sync worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for the next tick or trigger with work still pending
    #[default]
    Idle,
    Syncing,
    /// Nothing left to push
    Synced,
    /// Destination unreachable during the last cycle
    Offline,
    /// Last cycle failed
    Error,
    Stopped,
}

impl WorkerState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
