// ── Link domain types ──

use serde::{Deserialize, Serialize};

use super::{DeviceId, LinkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Optical,
    Copper,
    Wireless,
    Unknown,
}

/// A physical or logical connection between two devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "id")]
    pub link_id: LinkId,

    #[serde(rename = "side-a")]
    pub side_a: DeviceId,

    #[serde(rename = "side-b")]
    pub side_b: DeviceId,

    #[serde(rename = "side-a-iface")]
    pub side_a_iface: String,

    #[serde(rename = "side-b-iface")]
    pub side_b_iface: String,

    #[serde(rename = "link-type")]
    pub link_type: LinkType,

    #[serde(rename = "link-subtype")]
    pub link_subtype: Option<String>,
}
