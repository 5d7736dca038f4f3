// ── Domain types for the netwarden core ──

mod device;
mod event;
mod group;
mod link;
mod severity;
mod syslog;

pub use device::{DataSource, Device, DeviceConfiguration, DeviceStatus};
pub use event::AlertEvent;
pub use group::Group;
pub use link::{Link, LinkType};
pub use severity::AlertSeverity;
pub use syslog::{SyslogFacility, SyslogMessage, SyslogSeverity};

/// Identifier aliases. Devices, links and groups share one id space in the
/// topology source; a bare `ItemId` is used where either kind may appear.
pub type DeviceId = i64;
pub type LinkId = i64;
pub type GroupId = i64;
pub type ItemId = i64;
pub type RuleId = i64;

/// One device's (possibly nested) key→value fact record.
pub type FactMap = serde_json::Map<String, serde_json::Value>;

/// A full gathering cycle: `management_hostname` → fact record.
pub type FactsBatch = serde_json::Map<String, serde_json::Value>;
