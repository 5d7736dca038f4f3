// ── Alert rules ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AlertSeverity, ItemId, RuleId};

use super::predicate::{render_operand, AlertPredicate, PredicateOp};

/// How predicate results reduce to the rule verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReduceLogic {
    All,
    Any,
}

/// Which input stream a rule evaluates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDataSource {
    Facts,
    Syslog,
}

/// A loaded, validated alert rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    #[serde(rename = "id")]
    pub rule_id: RuleId,

    pub name: String,

    #[serde(rename = "requires-ack")]
    pub requires_ack: bool,

    pub severity: AlertSeverity,

    /// Device or group the rule watches; resolved against the topology
    /// at evaluation time.
    #[serde(rename = "target")]
    pub target_item: ItemId,

    #[serde(rename = "reduce-logic")]
    pub reduce_logic: ReduceLogic,

    #[serde(rename = "data-source")]
    pub data_source: RuleDataSource,

    pub predicates: Vec<AlertPredicate>,
}

impl AlertRule {
    /// Evaluate all predicates against one device record and reduce.
    ///
    /// An empty predicate list never matches, regardless of logic; ALL
    /// over an empty set would be vacuously true and a rule that always
    /// fires is never what anyone meant.
    pub fn matches(&self, record: &Value) -> bool {
        if self.predicates.is_empty() {
            return false;
        }
        match self.reduce_logic {
            ReduceLogic::All => self.predicates.iter().all(|p| p.eval(record)),
            ReduceLogic::Any => self.predicates.iter().any(|p| p.eval(record)),
        }
    }

    /// Concrete `(left, op, right)` triples for the predicates that
    /// individually held against the record. Used to render the alert
    /// value; predicates with unresolvable operands are skipped.
    pub fn raising_values<'a>(
        &'a self,
        record: &'a Value,
    ) -> Vec<(&'a Value, PredicateOp, &'a Value)> {
        self.predicates
            .iter()
            .filter(|p| p.eval(record))
            .filter_map(|p| {
                let left = p.eval_left(record)?;
                let right = p.eval_right(record)?;
                Some((left, p.op(), right))
            })
            .collect()
    }

    /// Human-readable rendering of the raising predicates, stored in the
    /// event's `value` field: `[95 MORE_THAN 90], [up NOT_EQUAL down]`.
    pub fn render_raised(&self, record: &Value) -> String {
        self.raising_values(record)
            .iter()
            .map(|(lhs, op, rhs)| format!("[{} {} {}]", render_operand(lhs), op, render_operand(rhs)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(logic: ReduceLogic, predicates: Value) -> AlertRule {
        AlertRule {
            rule_id: 1,
            name: "high load".into(),
            requires_ack: false,
            severity: AlertSeverity::Warning,
            target_item: 42,
            reduce_logic: logic,
            data_source: RuleDataSource::Facts,
            predicates: serde_json::from_value(predicates).unwrap(),
        }
    }

    fn two_predicates() -> Value {
        json!([
            {"left": "&cpu_load", "op": "more_than", "right": 90},
            {"left": "&status", "op": "equal", "right": "degraded"},
        ])
    }

    #[test]
    fn all_requires_every_predicate() {
        let rule = rule(ReduceLogic::All, two_predicates());
        assert!(rule.matches(&json!({"cpu_load": 95, "status": "degraded"})));
        assert!(!rule.matches(&json!({"cpu_load": 95, "status": "ok"})));
        assert!(!rule.matches(&json!({"cpu_load": 10, "status": "degraded"})));
    }

    #[test]
    fn any_requires_at_least_one() {
        let rule = rule(ReduceLogic::Any, two_predicates());
        assert!(rule.matches(&json!({"cpu_load": 95, "status": "ok"})));
        assert!(rule.matches(&json!({"cpu_load": 10, "status": "degraded"})));
        assert!(!rule.matches(&json!({"cpu_load": 10, "status": "ok"})));
    }

    #[test]
    fn missing_field_fails_closed() {
        let rule = rule(ReduceLogic::All, two_predicates());
        assert!(!rule.matches(&json!({"status": "degraded"})));
        assert!(!rule.matches(&json!({})));
    }

    #[test]
    fn empty_predicate_list_never_matches() {
        let rule = rule(ReduceLogic::All, json!([]));
        assert!(!rule.matches(&json!({"anything": 1})));
    }

    #[test]
    fn raising_values_only_include_firing_predicates() {
        let rule = rule(ReduceLogic::Any, two_predicates());
        let record = json!({"cpu_load": 95, "status": "ok"});

        let raised = rule.raising_values(&record);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].0, &json!(95));
        assert_eq!(raised[0].1, PredicateOp::MoreThan);
        assert_eq!(raised[0].2, &json!(90));

        assert_eq!(rule.render_raised(&record), "[95 MORE_THAN 90]");
    }

    #[test]
    fn render_joins_multiple_triggers() {
        let rule = rule(ReduceLogic::All, two_predicates());
        let record = json!({"cpu_load": 95, "status": "degraded"});
        assert_eq!(
            rule.render_raised(&record),
            "[95 MORE_THAN 90], [degraded EQUAL degraded]"
        );
    }
}
