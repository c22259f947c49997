//! Plugin seam between metric producers and the protocol runner

use async_trait::async_trait;

use falcon_core::{graph_definition, GraphGroup, MetricSnapshot, DEFAULT_PREFIX};
use falcon_probe::{CollectError, Collector, ReportSource};

/// A metric producer that mackerel-agent can run
#[async_trait]
pub trait MetricsPlugin: Send + Sync {
    /// First component of every metric and graph key
    fn metric_key_prefix(&self) -> &str;

    /// Static chart layout
    fn graph_definition(&self) -> Vec<GraphGroup>;

    /// Current metric values
    async fn fetch_metrics(&self) -> Result<MetricSnapshot, CollectError>;
}

/// Falcon sensor statistics
pub struct FalconPlugin<S> {
    prefix: String,
    collector: Collector<S>,
}

impl<S: ReportSource> FalconPlugin<S> {
    pub fn new(source: S) -> Self {
        Self::with_prefix(DEFAULT_PREFIX, source)
    }

    pub fn with_prefix(prefix: impl Into<String>, source: S) -> Self {
        Self {
            prefix: prefix.into(),
            collector: Collector::new(source),
        }
    }
}

#[async_trait]
impl<S: ReportSource> MetricsPlugin for FalconPlugin<S> {
    fn metric_key_prefix(&self) -> &str {
        &self.prefix
    }

    fn graph_definition(&self) -> Vec<GraphGroup> {
        graph_definition(&self.prefix)
    }

    async fn fetch_metrics(&self) -> Result<MetricSnapshot, CollectError> {
        self.collector.collect().await
    }
}
