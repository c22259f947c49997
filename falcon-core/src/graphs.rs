//! Graph metadata for the Falcon dashboard
//!
//! Groups the extracted metrics into labeled charts. The layout is static;
//! only the label prefix varies with the configured metric key prefix.

use serde::Serialize;

use crate::{EVENTS_RECEIVED, EVENTS_SENT};

/// Display unit of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum Unit {
    #[serde(rename = "float")]
    Float,
    #[default]
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "percentage")]
    Percentage,
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "bytes/sec")]
    BytesPerSecond,
    #[serde(rename = "iops")]
    Iops,
}

/// One metric line on a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDef {
    pub name: &'static str,
    pub label: &'static str,
    /// Report the per-minute change instead of the raw value
    #[serde(skip)]
    pub diff: bool,
    pub stacked: bool,
}

impl MetricDef {
    pub fn new(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            diff: false,
            stacked: false,
        }
    }

    pub fn differenced(mut self) -> Self {
        self.diff = true;
        self
    }

    pub fn stacked(mut self) -> Self {
        self.stacked = true;
        self
    }
}

/// A chart: related metrics sharing one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphGroup {
    #[serde(skip)]
    pub id: &'static str,
    pub label: String,
    pub unit: Unit,
    pub metrics: Vec<MetricDef>,
}

impl GraphGroup {
    pub fn new(id: &'static str, label: String, unit: Unit, metrics: Vec<MetricDef>) -> Self {
        Self {
            id,
            label,
            unit,
            metrics,
        }
    }
}

const ACTIVITY_METRICS: &[(&str, &str)] = &[
    ("activity_attempts", "Attempts"),
    ("activity_connects", "Connects"),
    ("activity_failures", "Failures"),
    ("activity_timeouts", "Timeouts"),
    ("activity_malformed_messages", "Malformed Messages"),
    ("activity_errors", "Errors"),
];

const MESSAGE_STORE_METRICS: &[(&str, &str)] = &[
    ("message_store_capacity", "Capacity"),
    ("message_store_size", "Size"),
];

const EVENT_SUMS_METRICS: &[(&str, &str)] = &[
    ("event_sums_sent", "Sent"),
    ("event_sums_received", "Received"),
    ("event_sums_ignored", "Ignored"),
    ("event_sums_resent", "Resent"),
    ("event_sums_resend_limit", "Resend Limit"),
    ("event_sums_overflow", "Overflow"),
];

const ACKNOWLEDGEMENT_SUMS_METRICS: &[(&str, &str)] = &[
    ("acknowledgement_sums_sent", "Sent"),
    ("acknowledgement_sums_received", "Received"),
    ("acknowledgement_sums_ignored", "Ignored"),
    ("acknowledgement_sums_resent", "Resent"),
    ("acknowledgement_sums_resend_limit", "Resend Limit"),
    ("acknowledgement_sums_overflow", "Overflow"),
];

const COMMUNICATIONS_BRIDGE_METRICS: &[(&str, &str)] = &[
    ("communications_bridge_kernel_sent", "Sent (kernel)"),
    ("communications_bridge_kernel_received", "Received (kernel)"),
    ("communications_bridge_user_sent", "Sent (user)"),
    ("communications_bridge_user_received", "Received (user)"),
];

const BUS_BRIDGE_METRICS: &[(&str, &str)] = &[
    ("bus_bridge_kernel_sent", "Sent (kernel)"),
    ("bus_bridge_kernel_received", "Received (kernel)"),
    ("bus_bridge_user_sent", "Sent (user)"),
    ("bus_bridge_user_received", "Received (user)"),
    ("bus_bridge_queue_size", "Queue Size"),
];

/// Graph id, title and metrics, in dashboard order
const GROUPS: &[(&str, &str, &[(&str, &str)])] = &[
    ("activity", "Cloud Activity", ACTIVITY_METRICS),
    ("message_store", "Message Store", MESSAGE_STORE_METRICS),
    ("event_sums", "Event Sums", EVENT_SUMS_METRICS),
    ("acknowledgement_sums", "Acknowledgement Sums", ACKNOWLEDGEMENT_SUMS_METRICS),
    ("events_sent", "Events Sent", EVENTS_SENT),
    ("events_received", "Events Received", EVENTS_RECEIVED),
    ("communications_bridge", "Communications Bridge", COMMUNICATIONS_BRIDGE_METRICS),
    ("bus_bridge", "Bus Bridge", BUS_BRIDGE_METRICS),
];

/// Build the Falcon graph layout with `prefix` in every chart title
pub fn graph_definition(prefix: &str) -> Vec<GraphGroup> {
    let label_prefix = title_case(prefix);

    GROUPS
        .iter()
        .map(|&(id, title, metrics)| {
            GraphGroup::new(
                id,
                format!("{} {}", label_prefix, title),
                Unit::Integer,
                metrics
                    .iter()
                    .map(|&(name, label)| MetricDef::new(name, label))
                    .collect(),
            )
        })
        .collect()
}

/// Upper-case the first letter of every word
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;

    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern_table;
    use std::collections::HashSet;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("falcon"), "Falcon");
        assert_eq!(title_case("Falcon"), "Falcon");
        assert_eq!(title_case("crowd strike-sensor"), "Crowd Strike-Sensor");
        assert_eq!(title_case("my_host"), "My_host");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_labels_use_prefix() {
        let graphs = graph_definition("sensor");
        assert_eq!(graphs.len(), 8);
        assert_eq!(graphs[0].id, "activity");
        assert_eq!(graphs[0].label, "Sensor Cloud Activity");
        assert!(graphs.iter().all(|g| g.label.starts_with("Sensor ")));
        assert!(graphs.iter().all(|g| g.unit == Unit::Integer));
    }

    #[test]
    fn test_every_metric_declared_once() {
        let graphs = graph_definition("Falcon");
        let names: Vec<&str> = graphs
            .iter()
            .flat_map(|g| g.metrics.iter().map(|m| m.name))
            .collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());

        let patterns: HashSet<&str> = pattern_table().names().collect();
        assert_eq!(unique, patterns);
    }

    #[test]
    fn test_no_differenced_metrics() {
        let graphs = graph_definition("Falcon");
        assert!(graphs
            .iter()
            .flat_map(|g| &g.metrics)
            .all(|m| !m.diff && !m.stacked));
    }
}
