// ── Group domain type ──

use serde::{Deserialize, Serialize};

use super::{GroupId, ItemId};

/// A named collection of devices and/or other groups.
///
/// `members` may reference devices or groups; nesting is arbitrary but the
/// membership graph must stay acyclic; the topology cache drops back-edges
/// on refresh so that group expansion always terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "id")]
    pub group_id: GroupId,

    pub name: String,

    #[serde(rename = "is-display-group")]
    pub is_display_group: bool,

    #[serde(default)]
    pub members: Vec<ItemId>,
}
