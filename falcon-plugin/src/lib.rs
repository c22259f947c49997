//! Falcon Plugin - mackerel-agent protocol adapter
//!
//! Wires the collector and graph metadata into the mackerel-agent
//! custom-metric plugin protocol:
//! - Graph definitions on meta invocations
//! - Tab separated metric values otherwise
//! - Previous-value state for differenced metrics

pub mod plugin;
pub mod mackerel;
pub mod state;

pub use plugin::*;
pub use mackerel::*;
pub use state::*;

use falcon_probe::CollectError;
use thiserror::Error;

/// Errors surfaced to mackerel-agent
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error("Failed to write plugin output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to save state to {path}: {source}")]
    State {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
