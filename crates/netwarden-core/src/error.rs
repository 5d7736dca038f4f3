// ── Core error types ──
//
// User-facing errors from netwarden-core. Evaluation-time predicate
// failures are deliberately NOT represented here: accessor resolution
// returns `Option` and a miss simply means "rule does not match".

use thiserror::Error;

use crate::model::RuleId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Rule loading ─────────────────────────────────────────────────
    #[error("Rule {rule_id} rejected: {reason}")]
    RuleRejected { rule_id: RuleId, reason: String },

    #[error("Rule source unavailable: {message}")]
    RuleSource { message: String },

    // ── Delivery ─────────────────────────────────────────────────────
    #[error("Alert persistence failed: {message}")]
    Persistence { message: String },

    #[error("Pipeline already started")]
    AlreadyStarted,
}

impl CoreError {
    pub(crate) fn rejected(rule_id: RuleId, reason: impl Into<String>) -> Self {
        Self::RuleRejected {
            rule_id,
            reason: reason.into(),
        }
    }
}
