//! Falcon Core - Report parsing and graph layout for the Falcon sensor plugin
//!
//! This crate provides the pure parts of the plugin:
//! - The pattern table binding metric names to `falconctl stats` lines
//! - Extraction of a metric snapshot from a captured report
//! - Graph metadata grouping metrics into dashboard charts

pub mod patterns;
pub mod extract;
pub mod graphs;

pub use patterns::*;
pub use extract::*;
pub use graphs::*;

/// Default metric key prefix
pub const DEFAULT_PREFIX: &str = "Falcon";

/// Default location of the sensor control utility (macOS)
pub const DEFAULT_FALCONCTL: &str = "/Library/CS/falconctl";

/// Argument that makes falconctl print its statistics report
pub const STATS_ARG: &str = "stats";

/// Default bound on one falconctl run, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
