// ── Persistence seams ──
//
// The core crate owns no database. Rule storage and alert persistence
// sit behind these traits so the embedding process can plug in its
// store, and tests can plug in stubs.

use std::future::Future;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{AlertEvent, RuleId};

/// One stored rule, as fetched from the rule store: identity columns
/// plus the JSON definition body.
#[derive(Debug, Clone)]
pub struct RuleRow {
    pub rule_id: RuleId,
    pub name: Option<String>,
    pub requires_ack: bool,
    pub definition: Value,
}

/// Where rules are loaded from.
pub trait RuleSource: Send + Sync {
    /// Fetch the complete current ruleset. The engine replaces its
    /// loaded set wholesale with whatever this returns.
    fn fetch_rules(&self) -> impl Future<Output = Result<Vec<RuleRow>, CoreError>> + Send;
}

/// Where raised alerts are persisted.
pub trait AlertSink: Send + Sync {
    /// Durably store one event, returning its assigned id. The delivery
    /// loop retries on error, so the insert must be idempotent-safe to
    /// attempt again.
    fn insert_alert(&self, event: &AlertEvent) -> impl Future<Output = Result<i64, CoreError>> + Send;
}
