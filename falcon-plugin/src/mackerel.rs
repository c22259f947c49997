//! mackerel-agent plugin protocol
//!
//! mackerel-agent runs the plugin once per interval and reads stdout:
//! - With `MACKEREL_AGENT_PLUGIN_META` set, it expects a header line and
//!   one JSON document with the graph definitions.
//! - Otherwise, one `key\tvalue\tepoch` line per metric.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use falcon_core::{GraphGroup, MetricSnapshot};

use crate::{MetricsPlugin, PluginError, State, StateStore};

/// Environment variable mackerel-agent sets when it wants graph definitions
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

/// First line of the graph definition output
pub const META_HEADER: &str = "# mackerel-agent-plugin";

/// What a single invocation prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Graph definitions (meta invocation)
    Definitions,
    /// Current metric values
    Values,
}

impl OutputMode {
    pub fn from_env() -> Self {
        match std::env::var(META_ENV) {
            Ok(v) if !v.is_empty() => OutputMode::Definitions,
            _ => OutputMode::Values,
        }
    }
}

#[derive(Serialize)]
struct GraphDefinitions<'a> {
    graphs: BTreeMap<String, &'a GraphGroup>,
}

/// Protocol runner around a [`MetricsPlugin`]
pub struct MackerelPlugin<P> {
    plugin: P,
    tempfile: Option<PathBuf>,
}

impl<P: MetricsPlugin> MackerelPlugin<P> {
    pub fn new(plugin: P) -> Self {
        Self {
            plugin,
            tempfile: None,
        }
    }

    /// State file for differenced metrics (default: see [`StateStore::default_for`])
    pub fn with_tempfile(mut self, tempfile: Option<PathBuf>) -> Self {
        self.tempfile = tempfile;
        self
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn state_store(&self) -> StateStore {
        match &self.tempfile {
            Some(path) => StateStore::new(path),
            None => StateStore::default_for(self.plugin.metric_key_prefix()),
        }
    }

    /// Full key of a graph: `<prefix>.<id>`
    pub fn graph_key(&self, id: &str) -> String {
        let prefix = self.plugin.metric_key_prefix();
        match (prefix.is_empty(), id.is_empty()) {
            (true, _) => id.to_string(),
            (false, true) => prefix.to_string(),
            (false, false) => format!("{}.{}", prefix, id),
        }
    }

    /// Print what mackerel-agent asked for through the environment
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<(), PluginError> {
        self.run_mode(OutputMode::from_env(), out).await
    }

    pub async fn run_mode<W: Write>(&self, mode: OutputMode, out: &mut W) -> Result<(), PluginError> {
        match mode {
            OutputMode::Definitions => self.output_definitions(out),
            OutputMode::Values => self.output_values(out).await,
        }
    }

    pub fn output_definitions<W: Write>(&self, out: &mut W) -> Result<(), PluginError> {
        let groups = self.plugin.graph_definition();
        let definitions = GraphDefinitions {
            graphs: groups.iter().map(|g| (self.graph_key(g.id), g)).collect(),
        };

        writeln!(out, "{}", META_HEADER)?;
        writeln!(out, "{}", serde_json::to_string(&definitions)?)?;
        out.flush()?;

        debug!("Printed {} graph definitions", groups.len());
        Ok(())
    }

    /// Collect once and print the values
    pub async fn output_values<W: Write>(&self, out: &mut W) -> Result<(), PluginError> {
        let snapshot = self.plugin.fetch_metrics().await?;
        self.write_values(out, &snapshot, Utc::now())
    }

    pub fn write_values<W: Write>(
        &self,
        out: &mut W,
        snapshot: &MetricSnapshot,
        now: DateTime<Utc>,
    ) -> Result<(), PluginError> {
        let groups = self.plugin.graph_definition();
        let needs_state = groups.iter().flat_map(|g| &g.metrics).any(|m| m.diff);

        let store = self.state_store();
        let last = if needs_state { store.load() } else { None };

        let mut printed = 0;
        for group in &groups {
            let key = self.graph_key(group.id);

            for metric in &group.metrics {
                let Some(mut value) = snapshot.get(metric.name) else {
                    debug!("No value for {}", metric.name);
                    continue;
                };

                if metric.diff {
                    match last.as_ref().and_then(|s| s.per_minute(metric.name, value, now)) {
                        Some(rate) => value = rate,
                        None => continue,
                    }
                }

                writeln!(out, "{}.{}\t{:.6}\t{}", key, metric.name, value, now.timestamp())?;
                printed += 1;
            }
        }
        out.flush()?;

        if needs_state {
            store.save(&State::new(snapshot, now))?;
        }

        info!("Printed {} metric values", printed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use falcon_core::{graph_definition, MetricDef, Unit};
    use falcon_probe::{CollectError, CommandError};

    struct TestPlugin {
        prefix: &'static str,
        snapshot: Option<MetricSnapshot>,
    }

    #[async_trait]
    impl MetricsPlugin for TestPlugin {
        fn metric_key_prefix(&self) -> &str {
            self.prefix
        }

        fn graph_definition(&self) -> Vec<GraphGroup> {
            vec![GraphGroup::new(
                "traffic",
                "Test Traffic".to_string(),
                Unit::Integer,
                vec![
                    MetricDef::new("sent", "Sent").differenced(),
                    MetricDef::new("queue", "Queue").stacked(),
                ],
            )]
        }

        async fn fetch_metrics(&self) -> Result<MetricSnapshot, CollectError> {
            self.snapshot.clone().ok_or_else(|| {
                CollectError::Command(CommandError::Io {
                    program: "test".to_string(),
                    source: std::io::Error::other("no report"),
                })
            })
        }
    }

    struct FalconLayout;

    #[async_trait]
    impl MetricsPlugin for FalconLayout {
        fn metric_key_prefix(&self) -> &str {
            "Falcon"
        }

        fn graph_definition(&self) -> Vec<GraphGroup> {
            graph_definition("Falcon")
        }

        async fn fetch_metrics(&self) -> Result<MetricSnapshot, CollectError> {
            let mut snapshot = MetricSnapshot::new();
            snapshot.insert("message_store_capacity", 42.0);
            snapshot.insert("activity_errors", 3.0);
            Ok(snapshot)
        }
    }

    fn snapshot(sent: f64, queue: f64) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::new();
        snapshot.insert("sent", sent);
        snapshot.insert("queue", queue);
        snapshot
    }

    fn render<P: MetricsPlugin>(plugin: &MackerelPlugin<P>, snap: &MetricSnapshot, now: DateTime<Utc>) -> String {
        let mut out = Vec::new();
        plugin.write_values(&mut out, snap, now).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_definitions_output() {
        let plugin = MackerelPlugin::new(FalconLayout);
        let mut out = Vec::new();
        plugin.output_definitions(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let (header, body) = text.split_once('\n').unwrap();
        assert_eq!(header, META_HEADER);

        let json: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        let graphs = json["graphs"].as_object().unwrap();
        assert_eq!(graphs.len(), 8);

        let activity = &graphs["Falcon.activity"];
        assert_eq!(activity["label"], "Falcon Cloud Activity");
        assert_eq!(activity["unit"], "integer");
        assert_eq!(activity["metrics"][0]["name"], "activity_attempts");
        assert_eq!(activity["metrics"][0]["label"], "Attempts");
        assert_eq!(activity["metrics"][0]["stacked"], false);
        assert!(activity["metrics"][0].get("diff").is_none());
        assert!(graphs.contains_key("Falcon.bus_bridge"));
    }

    #[tokio::test]
    async fn test_values_output() {
        let plugin = MackerelPlugin::new(FalconLayout);
        let mut out = Vec::new();
        plugin.run_mode(OutputMode::Values, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Falcon.activity.activity_errors\t3.000000\t"));
        let fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(fields[0], "Falcon.message_store.message_store_capacity");
        assert_eq!(fields[1], "42.000000");
        assert!(fields[2].parse::<i64>().is_ok());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = MackerelPlugin::new(TestPlugin { prefix: "test", snapshot: None })
            .with_tempfile(Some(dir.path().join("state")));
        let mut out = Vec::new();
        let err = plugin.run_mode(OutputMode::Values, &mut out).await.unwrap_err();
        assert!(matches!(err, PluginError::Collect(CollectError::Command(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn test_diff_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = MackerelPlugin::new(TestPlugin { prefix: "test", snapshot: None })
            .with_tempfile(Some(dir.path().join("state")));
        let then = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        // First run has nothing to diff against
        let first = render(&plugin, &snapshot(100.0, 5.0), then);
        assert_eq!(first, "test.traffic.queue\t5.000000\t1700000000\n");

        let second = render(&plugin, &snapshot(220.0, 6.0), then + Duration::seconds(60));
        assert_eq!(
            second,
            "test.traffic.sent\t120.000000\t1700000060\ntest.traffic.queue\t6.000000\t1700000060\n"
        );

        // Counter reset: rate is dropped, raw values still saved
        let third = render(&plugin, &snapshot(10.0, 7.0), then + Duration::seconds(120));
        assert_eq!(third, "test.traffic.queue\t7.000000\t1700000120\n");
        assert_eq!(plugin.state_store().load().unwrap().values["sent"], 10.0);
    }

    #[test]
    fn test_no_state_without_diff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let plugin = MackerelPlugin::new(FalconLayout).with_tempfile(Some(path.clone()));
        render(&plugin, &MetricSnapshot::new(), Utc::now());
        assert!(!path.exists());
    }

    #[test]
    fn test_graph_key() {
        let plugin = MackerelPlugin::new(TestPlugin { prefix: "", snapshot: None });
        assert_eq!(plugin.graph_key("traffic"), "traffic");
        let plugin = MackerelPlugin::new(FalconLayout);
        assert_eq!(plugin.graph_key("activity"), "Falcon.activity");
        assert_eq!(plugin.graph_key(""), "Falcon");
    }

    #[test]
    fn test_default_state_path() {
        let plugin = MackerelPlugin::new(FalconLayout);
        let store = plugin.state_store();
        assert!(store.path().ends_with("mackerel-plugin-falcon"));
    }
}
