//! Sync scheduling configuration.
//!
//! Settings come from a JSON document (all fields optional, unknown fields
//! rejected) and can be overridden from the environment.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Destination;
use crate::util::{compact_text, normalize_text_option};

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BACKOFF_SECS: u64 = 900;

/// Environment variable overriding `batch_size`
pub const ENV_BATCH_SIZE: &str = "VISUS_SYNC_BATCH_SIZE";
/// Environment variable overriding `interval_secs`
pub const ENV_INTERVAL_SECS: &str = "VISUS_SYNC_INTERVAL_SECS";
/// Environment variable overriding `push_timeout_secs`
pub const ENV_PUSH_TIMEOUT_SECS: &str = "VISUS_SYNC_PUSH_TIMEOUT_SECS";

/// Scheduling settings shared by every sync worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSettings {
    /// Records pushed per table per cycle
    pub batch_size: usize,
    /// Delay between cycles when nothing is failing
    pub interval_secs: u64,
    /// A push without an answer after this long counts as failed
    pub push_timeout_secs: u64,
    /// Upper bound for the exponential backoff after failed cycles
    pub max_backoff_secs: u64,
    /// Per-destination overrides
    pub destinations: BTreeMap<Destination, DestinationSettings>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            interval_secs: DEFAULT_INTERVAL_SECS,
            push_timeout_secs: DEFAULT_PUSH_TIMEOUT_SECS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            destinations: BTreeMap::new(),
        }
    }
}

/// Per-destination settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DestinationSettings {
    pub enabled: bool,
    /// Overrides the shared interval
    pub interval_secs: Option<u64>,
}

impl Default for DestinationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: None,
        }
    }
}

impl SyncSettings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".into()));
        }
        if self.push_timeout_secs == 0 {
            return Err(Error::Config(
                "push_timeout_secs must be greater than 0".into(),
            ));
        }
        for destination in Destination::ALL {
            let interval = self.interval_secs_for(destination);
            if interval == 0 {
                return Err(Error::Config(format!(
                    "sync interval for {destination} must be greater than 0"
                )));
            }
            if self.max_backoff_secs < interval {
                return Err(Error::Config(format!(
                    "max_backoff_secs ({}) is shorter than the {destination} interval ({interval})",
                    self.max_backoff_secs
                )));
            }
        }
        Ok(())
    }

    /// Whether a worker should run for `destination`
    pub fn is_enabled(&self, destination: Destination) -> bool {
        self.destinations
            .get(&destination)
            .map_or(true, |settings| settings.enabled)
    }

    fn interval_secs_for(&self, destination: Destination) -> u64 {
        self.destinations
            .get(&destination)
            .and_then(|settings| settings.interval_secs)
            .unwrap_or(self.interval_secs)
    }

    /// Delay between successful cycles for `destination`
    pub fn interval(&self, destination: Destination) -> Duration {
        Duration::from_secs(self.interval_secs_for(destination))
    }

    pub const fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    /// Defaults with the process environment's overrides applied
    pub fn from_env_overrides() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `VISUS_SYNC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = read_override(&lookup, ENV_BATCH_SIZE)? {
            self.batch_size = value;
        }
        if let Some(value) = read_override(&lookup, ENV_INTERVAL_SECS)? {
            self.interval_secs = value;
        }
        if let Some(value) = read_override(&lookup, ENV_PUSH_TIMEOUT_SECS)? {
            self.push_timeout_secs = value;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Parse and validate settings from a JSON payload.
pub fn parse_sync_settings(payload: &str) -> Result<SyncSettings> {
    let settings: SyncSettings = serde_json::from_str(payload)
        .map_err(|error| Error::Config(format!("invalid sync settings JSON: {error}")))?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a JSON file; a missing file yields the defaults.
pub fn load_sync_settings(path: &Path) -> Result<SyncSettings> {
    match std::fs::read_to_string(path) {
        Ok(payload) => parse_sync_settings(&payload),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No sync settings at {}; using defaults", path.display());
            Ok(SyncSettings::default())
        }
        Err(error) => Err(error.into()),
    }
}

fn read_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = normalize_text_option(lookup(key)) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|_| {
        Error::Config(format!(
            "{key} must be a non-negative integer, got '{}'",
            compact_text(&raw)
        ))
    })
}
