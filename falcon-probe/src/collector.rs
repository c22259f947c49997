//! Collection cycle
//!
//! Captures one report and extracts the full metric snapshot from it.
//! Either step failing aborts the cycle with no values.

use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use falcon_core::{extract_metrics, ExtractError, MetricSnapshot};

use crate::{CommandError, ReportSource};

/// Errors from a collection cycle
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Status command failed: {0}")]
    Command(#[from] CommandError),

    #[error("Report extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// Runs collection cycles against a report source
pub struct Collector<S> {
    source: S,
}

impl<S: ReportSource> Collector<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Capture a report and extract every metric from it
    pub async fn collect(&self) -> Result<MetricSnapshot, CollectError> {
        let started = Instant::now();
        debug!("Capturing report from {}", self.source.describe());

        let report = self.source.capture().await?;
        let snapshot = extract_metrics(&report)?;

        info!(
            "Collected {} metrics in {:?}",
            snapshot.len(),
            started.elapsed()
        );

        Ok(snapshot)
    }
}
