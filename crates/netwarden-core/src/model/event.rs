// ── Raised alert events ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AlertSeverity, Device, DeviceId, RuleId};
use crate::engine::rule::AlertRule;

/// An alert raised by rule evaluation, owned by the delivery loop until
/// both delivery legs have been attempted.
///
/// `db_notified` and `ws_notified` track the two delivery legs
/// independently: listener fan-out is attempted once (best effort), the
/// durable insert is retried until it succeeds (at least once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Assigned by the persistence sink on first successful insert;
    /// `-1` until then.
    #[serde(rename = "alert-id")]
    pub alert_id: i64,

    #[serde(rename = "alert-time")]
    pub alert_time: DateTime<Utc>,

    #[serde(rename = "ack-time")]
    pub ack_time: Option<DateTime<Utc>>,

    #[serde(rename = "requires-ack")]
    pub requires_ack: bool,

    pub severity: AlertSeverity,

    pub message: String,

    /// The specific device that matched, not necessarily the rule's
    /// target, which may be a group.
    #[serde(rename = "target-id")]
    pub target_id: DeviceId,

    #[serde(rename = "rule-id")]
    pub rule_id: RuleId,

    /// Rendering of which predicate(s) fired and with what operands.
    pub value: String,

    pub acked: bool,
    pub ws_notified: bool,
    pub db_notified: bool,
}

impl AlertEvent {
    /// Build a fresh event for a `(rule, device)` match.
    pub fn raised(rule: &AlertRule, device: &Device, value: String) -> Self {
        Self {
            alert_id: -1,
            alert_time: Utc::now(),
            ack_time: None,
            requires_ack: rule.requires_ack,
            severity: rule.severity,
            message: format!(
                "'{}' Triggered for device='{}'",
                rule.name,
                device.display_name()
            ),
            target_id: device.device_id,
            rule_id: rule.rule_id,
            value,
            acked: !rule.requires_ack,
            ws_notified: false,
            db_notified: false,
        }
    }
}
