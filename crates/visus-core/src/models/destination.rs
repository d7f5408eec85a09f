//! Remote sync destinations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// An independent remote system the local store converges with.
///
/// Each variant owns one dirty-flag column on every table and one sync
/// worker. Adding a variant adds a column; acknowledgement handling is
/// written against the enum and does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Debugging/telemetry endpoint
    Debug,
    /// Clinical insight analytics endpoint
    Insight,
}

impl Destination {
    /// Every known destination, in column order
    pub const ALL: [Self; 2] = [Self::Debug, Self::Insight];

    /// Number of known destinations
    pub const COUNT: usize = Self::ALL.len();

    /// Stable lowercase name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Insight => "insight",
        }
    }

    /// Name of this destination's dirty-flag column
    pub const fn dirty_column(self) -> &'static str {
        match self {
            Self::Debug => "dirty_debug",
            Self::Insight => "dirty_insight",
        }
    }

    /// Position of this destination in [`Destination::ALL`]
    pub const fn index(self) -> usize {
        match self {
            Self::Debug => 0,
            Self::Insight => 1,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "insight" => Ok(Self::Insight),
            other => Err(Error::InvalidInput(format!("unknown destination '{other}'"))),
        }
    }
}

/// Per-destination dirty flags of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFlags([bool; Destination::COUNT]);

impl DirtyFlags {
    /// Every destination dirty
    pub const fn all_dirty() -> Self {
        Self([true; Destination::COUNT])
    }

    /// Every destination clean
    pub const fn all_clean() -> Self {
        Self([false; Destination::COUNT])
    }

    /// Whether `destination` still has unpushed changes
    pub const fn is_dirty(&self, destination: Destination) -> bool {
        self.0[destination.index()]
    }

    /// Set the flag for one destination
    pub fn set(&mut self, destination: Destination, dirty: bool) {
        self.0[destination.index()] = dirty;
    }

    /// True when no destination has unpushed changes
    pub fn is_clean(&self) -> bool {
        self.0.iter().all(|dirty| !dirty)
    }

    /// True when every destination has unpushed changes
    pub fn is_all_dirty(&self) -> bool {
        self.0.iter().all(|dirty| *dirty)
    }

    /// Destinations that are still dirty
    pub fn dirty_destinations(&self) -> Vec<Destination> {
        Destination::ALL
            .into_iter()
            .filter(|destination| self.is_dirty(*destination))
            .collect()
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        Self::all_dirty()
    }
}
