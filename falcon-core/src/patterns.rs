//! Pattern table for `falconctl stats` reports
//!
//! Every reported metric is bound to a regular expression with one capture
//! group and an occurrence index. The report repeats the same counter labels
//! ("Sent", "Received", ...) in several blocks, so the index picks which
//! match, counted top to bottom over the whole report, belongs to the metric.

use regex::Regex;
use std::sync::LazyLock;

/// Occurrence of a repeated counter line inside the "Event Sums" block
pub const EVENT_SUMS: usize = 0;
/// Occurrence inside the "Acknowledgement Sums" block
pub const ACKNOWLEDGEMENT_SUMS: usize = 1;
/// Occurrence inside the "Communications Bridge" block
pub const COMMUNICATIONS_BRIDGE: usize = 2;
/// Occurrence inside the "Bus Bridge" block
pub const BUS_BRIDGE: usize = 3;

/// Event types counted under "Events Sent" (metric name, report label)
pub const EVENTS_SENT: &[(&str, &str)] = &[
    ("agent_connect_mac_v4", "AgentConnectMacV4"),
    ("asep_file_change_mac_v1", "AsepFileChangeMacV1"),
    ("asep_file_change_mac_v2", "AsepFileChangeMacV2"),
    ("associate_tree_id_with_root_mac_v5", "AssociateTreeIdWithRootMacV5"),
    ("b_zip2_file_written_mac_v1", "BZip2FileWrittenMacV1"),
    ("channel_version_required_mac_v1", "ChannelVersionRequiredMacV1"),
    ("config_state_update_mac_v1", "ConfigStateUpdateMacV1"),
    ("critical_file_modified_mac_v2", "CriticalFileModifiedMacV2"),
    ("current_system_tags_mac_v1", "CurrentSystemTagsMacV1"),
    ("directory_create_mac_v1", "DirectoryCreateMacV1"),
    ("dns_request_mac_v1", "DnsRequestMacV1"),
    ("dynamic_classification_mac_v1", "DynamicClassificationMacV1"),
    ("end_of_process_mac_v14", "EndOfProcessMacV14"),
    ("executable_deleted_mac_v1", "ExecutableDeletedMacV1"),
    ("firewall_delete_rule_i_p4_mac_v1", "FirewallDeleteRuleIP4MacV1"),
    ("firewall_delete_rule_i_p6_mac_v1", "FirewallDeleteRuleIP6MacV1"),
    ("firewall_disabled_mac_v1", "FirewallDisabledMacV1"),
    ("firewall_enabled_mac_v1", "FirewallEnabledMacV1"),
    ("firewall_set_rule_i_p4_mac_v1", "FirewallSetRuleIP4MacV1"),
    ("firewall_set_rule_i_p6_mac_v1", "FirewallSetRuleIP6MacV1"),
    ("fs_volume_mounted_mac_v1", "FsVolumeMountedMacV1"),
    ("fs_volume_unmounted_mac_v1", "FsVolumeUnmountedMacV1"),
    ("hash_policy_lightning_query_mac_v2", "HashPolicyLightningQueryMacV2"),
    ("image_hash_mac_v1", "ImageHashMacV1"),
    ("l_f_o_download_confirmation_mac_v1", "LFODownloadConfirmationMacV1"),
    ("lightning_latency_info_mac_v1", "LightningLatencyInfoMacV1"),
    ("local_ip_address_i_p4_mac_v1", "LocalIpAddressIP4MacV1"),
    ("local_ip_address_removed_i_p4_mac_v1", "LocalIpAddressRemovedIP4MacV1"),
    ("mach_o_file_written_mac_v3", "MachOFileWrittenMacV3"),
    ("neighbor_list_i_p4_mac_v1", "NeighborListIP4MacV1"),
    ("network_connect_i_p4_mac_v5", "NetworkConnectIP4MacV5"),
    ("network_connect_i_p6_mac_v5", "NetworkConnectIP6MacV5"),
    ("network_listen_i_p4_mac_v5", "NetworkListenIP4MacV5"),
    ("network_listen_i_p6_mac_v5", "NetworkListenIP6MacV5"),
    ("new_executable_renamed_mac_v1", "NewExecutableRenamedMacV1"),
    ("new_executable_written_mac_v2", "NewExecutableWrittenMacV2"),
    ("new_script_written_mac_v2", "NewScriptWrittenMacV2"),
    ("ole_file_written_mac_v1", "OleFileWrittenMacV1"),
];

/// Event types counted under "Events Received" (metric name, report label)
pub const EVENTS_RECEIVED: &[(&str, &str)] = &[
    ("hash_policy_lightning_response_mac_v2", "HashPolicyLightningResponseMacV2"),
    ("l_f_o_download_mac_v1", "LFODownloadMacV1"),
];

// Counter lines shared by the sums and bridge blocks. The first numeric
// column is the total (kernel side for bridges), the second the user side.
const SENT: &str = r" +Sent +([0-9]+) ";
const RECEIVED: &str = r" +Received +([0-9]+) ";
const IGNORED: &str = r" +Ignored +([0-9]+) ";
const RESENT: &str = r" +Resent +([0-9]+) ";
const RESEND_LIMIT: &str = r" +Resend Limit +([0-9]+) ";
const OVERFLOW: &str = r" +Overflow +([0-9]+) ";
const SENT_USER: &str = r" +Sent +[0-9]+ +([0-9]+) ";
const RECEIVED_USER: &str = r" +Received +[0-9]+ +([0-9]+) ";

/// Single-line metrics: (metric name, pattern, occurrence)
const LINE_PATTERNS: &[(&str, &str, usize)] = &[
    // Message Store
    ("message_store_capacity", r" +Capacity: ([0-9]+)", 0),
    ("message_store_size", r" +Size: ([0-9]+)", 0),
    // Cloud Activity
    ("activity_attempts", r" +Attempts: ([0-9]+)", 0),
    ("activity_connects", r" +Connects: ([0-9]+)", 0),
    ("activity_failures", r" +Failures: ([0-9]+)", 0),
    ("activity_timeouts", r" +Timeouts: ([0-9]+)", 0),
    ("activity_malformed_messages", r" +Malformed Messages: ([0-9]+)", 0),
    ("activity_errors", r" +Errors: ([0-9]+)", 0),
    // Event Sums
    ("event_sums_sent", SENT, EVENT_SUMS),
    ("event_sums_received", RECEIVED, EVENT_SUMS),
    ("event_sums_ignored", IGNORED, EVENT_SUMS),
    ("event_sums_resent", RESENT, EVENT_SUMS),
    ("event_sums_resend_limit", RESEND_LIMIT, EVENT_SUMS),
    ("event_sums_overflow", OVERFLOW, EVENT_SUMS),
    // Acknowledgement Sums
    ("acknowledgement_sums_sent", SENT, ACKNOWLEDGEMENT_SUMS),
    ("acknowledgement_sums_received", RECEIVED, ACKNOWLEDGEMENT_SUMS),
    ("acknowledgement_sums_ignored", IGNORED, ACKNOWLEDGEMENT_SUMS),
    ("acknowledgement_sums_resent", RESENT, ACKNOWLEDGEMENT_SUMS),
    ("acknowledgement_sums_resend_limit", RESEND_LIMIT, ACKNOWLEDGEMENT_SUMS),
    ("acknowledgement_sums_overflow", OVERFLOW, ACKNOWLEDGEMENT_SUMS),
    // Communications Bridge
    ("communications_bridge_kernel_sent", SENT, COMMUNICATIONS_BRIDGE),
    ("communications_bridge_kernel_received", RECEIVED, COMMUNICATIONS_BRIDGE),
    ("communications_bridge_user_sent", SENT_USER, COMMUNICATIONS_BRIDGE),
    ("communications_bridge_user_received", RECEIVED_USER, COMMUNICATIONS_BRIDGE),
    // Bus Bridge
    ("bus_bridge_kernel_sent", SENT, BUS_BRIDGE),
    ("bus_bridge_kernel_received", RECEIVED, BUS_BRIDGE),
    ("bus_bridge_user_sent", SENT_USER, BUS_BRIDGE),
    ("bus_bridge_user_received", RECEIVED_USER, BUS_BRIDGE),
    ("bus_bridge_queue_size", r" +Event Queue Size +- +([0-9]+) ", 0),
];

/// A metric bound to the report line it is read from
#[derive(Debug, Clone)]
pub struct MetricPattern {
    /// Metric name (unique key, part of the dashboard contract)
    pub name: &'static str,
    /// Matching rule; capture group 1 holds the number
    pub regex: Regex,
    /// Which match, counted from the top of the report, to read
    pub occurrence: usize,
}

impl MetricPattern {
    pub fn new(name: &'static str, pattern: &str, occurrence: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            occurrence,
        })
    }

    /// Pattern for a per-event-type counter line such as `DnsRequestMacV1  12  0`
    pub fn event_counter(name: &'static str, label: &str) -> Result<Self, regex::Error> {
        Self::new(name, &format!(r" +{} +([0-9]+) ", regex::escape(label)), 0)
    }
}

/// The full, ordered set of metric patterns
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    patterns: Vec<MetricPattern>,
}

impl PatternTable {
    pub fn new(patterns: Vec<MetricPattern>) -> Self {
        Self { patterns }
    }

    /// Table for the `falconctl stats` report format
    pub fn falconctl() -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(
            LINE_PATTERNS.len() + EVENTS_SENT.len() + EVENTS_RECEIVED.len(),
        );

        for &(name, pattern, occurrence) in LINE_PATTERNS {
            patterns.push(MetricPattern::new(name, pattern, occurrence)?);
        }
        for &(name, label) in EVENTS_SENT.iter().chain(EVENTS_RECEIVED) {
            patterns.push(MetricPattern::event_counter(name, label)?);
        }

        Ok(Self::new(patterns))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricPattern> {
        self.patterns.iter()
    }

    pub fn get(&self, name: &str) -> Option<&MetricPattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.patterns.iter().map(|p| p.name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

static FALCONCTL_TABLE: LazyLock<PatternTable> =
    LazyLock::new(|| PatternTable::falconctl().unwrap());

/// Process-wide pattern table for `falconctl stats`
pub fn pattern_table() -> &'static PatternTable {
    &FALCONCTL_TABLE
}
