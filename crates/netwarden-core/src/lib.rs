// netwarden-core: Alert subsystem for fleet monitoring -- rule engine,
// topology cache, and the concurrent event pipeline between them.

pub mod config;
pub mod engine;
pub mod error;
pub mod listeners;
pub mod model;
pub mod pipeline;
pub mod sources;
pub mod topology;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use engine::predicate::{AccessorPath, AlertPredicate, PredicateOp};
pub use engine::rule::{AlertRule, ReduceLogic, RuleDataSource};
pub use engine::{RuleEngine, RuleSet};
pub use error::CoreError;
pub use listeners::{ListenerId, ListenerRegistry};
pub use pipeline::EventPipeline;
pub use sources::{AlertSink, RuleRow, RuleSource};
pub use topology::{TopologyCache, TopologyItem, TopologySnapshot};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Fleet entities
    DataSource, Device, DeviceConfiguration, DeviceId, DeviceStatus, Group, GroupId, ItemId,
    Link, LinkId, LinkType, RuleId,
    // Alerts
    AlertEvent, AlertSeverity,
    // Input streams
    FactMap, FactsBatch, SyslogFacility, SyslogMessage, SyslogSeverity,
};
