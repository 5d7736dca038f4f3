// ── Device domain types ──

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{DeviceId, FactMap};

/// How facts are gathered from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Ssh,
    Snmp,
    Icmp,
    Syslog,
}

/// Last known reachability of a device, updated by the facts pipeline
/// between full topology refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Reachable,
    Unreachable,
    #[default]
    Unknown,
}

impl DeviceStatus {
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Which values a device is polled for, and which it actually exposed
/// on the last gathering cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    #[serde(rename = "requested-metadata")]
    pub requested_metadata: HashSet<String>,

    #[serde(rename = "requested-metrics")]
    pub requested_metrics: HashSet<String>,

    #[serde(rename = "available-values")]
    pub available_values: HashSet<String>,

    #[serde(rename = "data-sources")]
    pub data_sources: HashSet<DataSource>,
}

/// A monitored network device.
///
/// Identity and display fields come from the topology source and are
/// replaced wholesale on every cache refresh; `status` and `metadata`
/// are folded in incrementally from the facts stream in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "id")]
    pub device_id: DeviceId,

    #[serde(rename = "name")]
    pub name: Option<String>,

    #[serde(rename = "position-x")]
    pub position_x: f64,

    #[serde(rename = "position-y")]
    pub position_y: f64,

    pub latitude: f64,
    pub longitude: f64,

    /// Join key into fact and syslog records.
    #[serde(rename = "management-hostname")]
    pub management_hostname: String,

    pub configuration: DeviceConfiguration,

    #[serde(default)]
    pub status: DeviceStatus,

    #[serde(default)]
    pub metadata: FactMap,
}

impl Device {
    /// Display name, falling back to the management hostname.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.management_hostname)
    }
}
