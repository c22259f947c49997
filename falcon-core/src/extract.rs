//! Metric extraction from captured `falconctl stats` reports
//!
//! Extraction is all-or-nothing: every pattern in the table must yield a
//! number, otherwise the whole snapshot is rejected.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::{pattern_table, MetricPattern, PatternTable};

/// Errors from report extraction
#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("Pattern for {metric} not found in report ({found} of {needed} required matches)")]
    PatternNotFound {
        metric: String,
        found: usize,
        needed: usize,
    },

    #[error("Cannot parse value {raw:?} for {metric}")]
    MetricParseFailure { metric: String, raw: String },
}

impl ExtractError {
    /// Name of the metric that failed
    pub fn metric(&self) -> &str {
        match self {
            ExtractError::PatternNotFound { metric, .. } => metric,
            ExtractError::MetricParseFailure { metric, .. } => metric,
        }
    }
}

/// Metric values read from one report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricSnapshot {
    values: BTreeMap<String, f64>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for MetricSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Extract every falconctl metric from a captured report
pub fn extract_metrics(report: &str) -> Result<MetricSnapshot, ExtractError> {
    extract_with(pattern_table(), report)
}

/// Extract the metrics of an arbitrary pattern table from a report
pub fn extract_with(table: &PatternTable, report: &str) -> Result<MetricSnapshot, ExtractError> {
    let mut snapshot = MetricSnapshot::new();

    for pattern in table.iter() {
        let value = read_metric(pattern, report)?;
        snapshot.insert(pattern.name, value);
    }

    debug!(
        "Extracted {} metrics from {} byte report",
        snapshot.len(),
        report.len()
    );

    Ok(snapshot)
}

/// Read a single metric: the capture of the pattern's n-th match
pub fn read_metric(pattern: &MetricPattern, report: &str) -> Result<f64, ExtractError> {
    let needed = pattern.occurrence + 1;

    let Some(captures) = pattern.regex.captures_iter(report).nth(pattern.occurrence) else {
        return Err(ExtractError::PatternNotFound {
            metric: pattern.name.to_string(),
            found: pattern.regex.captures_iter(report).count(),
            needed,
        });
    };

    let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();

    parse_number(raw).ok_or_else(|| ExtractError::MetricParseFailure {
        metric: pattern.name.to_string(),
        raw: raw.to_string(),
    })
}

/// Base-10 number; infinities and NaN are not counter values
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
