//! Previous-value state for differenced metrics
//!
//! mackerel-agent starts the plugin afresh every interval, so the values of
//! the last run are kept in a small JSON file between invocations.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use falcon_core::MetricSnapshot;

use crate::PluginError;

/// Environment variable overriding the directory for state files
pub const WORKDIR_ENV: &str = "MACKEREL_PLUGIN_WORKDIR";

/// Longest gap between runs that still yields a rate, in seconds
pub const MAX_DIFF_INTERVAL_SECS: i64 = 600;

/// Values of one run plus the time they were taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(rename = "_lastTime")]
    pub last_time: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl State {
    pub fn new(snapshot: &MetricSnapshot, taken_at: DateTime<Utc>) -> Self {
        Self {
            last_time: taken_at.timestamp(),
            values: snapshot
                .iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.last_time, 0).single()
    }

    /// Per-minute change of `name` between this state and `value` at `now`
    ///
    /// `None` when there is no previous value, the interval is empty or too
    /// long, or the counter went backwards (reset).
    pub fn per_minute(&self, name: &str, value: f64, now: DateTime<Utc>) -> Option<f64> {
        let last = *self.values.get(name)?;
        let elapsed = now.timestamp() - self.last_time;

        if elapsed <= 0 || elapsed > MAX_DIFF_INTERVAL_SECS {
            debug!("Skipping diff for {}: {}s since last run", name, elapsed);
            return None;
        }
        if value < last {
            debug!("Counter {} seems to be reset ({} -> {})", name, last, value);
            return None;
        }

        Some((value - last) * 60.0 / elapsed as f64)
    }
}

/// JSON state file on disk
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$MACKEREL_PLUGIN_WORKDIR` (or the temp dir) + `mackerel-plugin-<prefix>`
    pub fn default_for(prefix: &str) -> Self {
        let dir = std::env::var_os(WORKDIR_ENV)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        Self::new(dir.join(format!("mackerel-plugin-{}", prefix.to_lowercase())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last state; unreadable or corrupt files count as no state
    pub fn load(&self) -> Option<State> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Cannot read state file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring corrupt state file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, state: &State) -> Result<(), PluginError> {
        let content = serde_json::to_vec(state)?;
        std::fs::write(&self.path, content).map_err(|source| PluginError::State {
            path: self.path.display().to_string(),
            source,
        })
    }
}
