// ── Rule engine ──
//
// Loads rule definitions from the rule store, keeps the active ruleset
// behind an atomic pointer, and evaluates incoming records against it.
// Invalid rules are skipped with a warning; they never poison a reload.

pub mod predicate;
pub mod rule;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{AlertEvent, FactsBatch, RuleId};
use crate::sources::{RuleRow, RuleSource};
use crate::topology::{TopologyCache, TopologyItem};

use predicate::AlertPredicate;
use rule::{AlertRule, ReduceLogic, RuleDataSource};

// ── Ruleset ────────────────────────────────────────────────────────────

/// One immutable version of the loaded rules, split per input stream.
#[derive(Debug, Default)]
pub struct RuleSet {
    facts: Vec<Arc<AlertRule>>,
    syslog: Vec<Arc<AlertRule>>,
    by_id: HashMap<RuleId, Arc<AlertRule>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RuleSet {
    fn from_rules(rules: Vec<Arc<AlertRule>>, loaded_at: DateTime<Utc>) -> Self {
        let mut set = Self {
            loaded_at: Some(loaded_at),
            ..Self::default()
        };
        for rule in rules {
            set.insert(rule);
        }
        set
    }

    /// Copy with `rule` added, replacing any previous rule with the
    /// same id.
    fn with_rule(&self, rule: Arc<AlertRule>) -> Self {
        let mut set = Self {
            facts: self.facts.clone(),
            syslog: self.syslog.clone(),
            by_id: self.by_id.clone(),
            loaded_at: self.loaded_at,
        };
        if set.by_id.contains_key(&rule.rule_id) {
            set.facts.retain(|r| r.rule_id != rule.rule_id);
            set.syslog.retain(|r| r.rule_id != rule.rule_id);
        }
        set.insert(rule);
        set
    }

    fn insert(&mut self, rule: Arc<AlertRule>) {
        match rule.data_source {
            RuleDataSource::Facts => self.facts.push(Arc::clone(&rule)),
            RuleDataSource::Syslog => self.syslog.push(Arc::clone(&rule)),
        }
        self.by_id.insert(rule.rule_id, rule);
    }

    fn for_source(&self, source: RuleDataSource) -> &[Arc<AlertRule>] {
        match source {
            RuleDataSource::Facts => &self.facts,
            RuleDataSource::Syslog => &self.syslog,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ── Definition parsing ─────────────────────────────────────────────────

fn parse_definition(row: &RuleRow) -> Result<AlertRule, CoreError> {
    let def = row
        .definition
        .as_object()
        .ok_or_else(|| CoreError::rejected(row.rule_id, "definition is not a JSON object"))?;

    let severity = field(row.rule_id, def, "severity")?;
    let reduce_logic: ReduceLogic = field(row.rule_id, def, "reduce-logic")?;
    let data_source: RuleDataSource = field(row.rule_id, def, "source")?;
    let target_item = field(row.rule_id, def, "target")?;
    let predicates: Vec<AlertPredicate> = field(row.rule_id, def, "predicates")?;

    let name = match row.name.as_deref() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => {
            let generated = format!("rule-{}", row.rule_id);
            warn!(rule_id = row.rule_id, name = %generated, "unnamed rule, using generated name");
            generated
        }
    };

    Ok(AlertRule {
        rule_id: row.rule_id,
        name,
        requires_ack: row.requires_ack,
        severity,
        target_item,
        reduce_logic,
        data_source,
        predicates,
    })
}

fn field<T: DeserializeOwned>(
    rule_id: RuleId,
    def: &Map<String, Value>,
    key: &str,
) -> Result<T, CoreError> {
    let value = def
        .get(key)
        .ok_or_else(|| CoreError::rejected(rule_id, format!("missing '{key}'")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::rejected(rule_id, format!("invalid '{key}': {e}")))
}

// ── Engine ─────────────────────────────────────────────────────────────

/// Evaluates fact and syslog records against the loaded ruleset.
///
/// The active [`RuleSet`] is swapped wholesale on reload; evaluation in
/// flight keeps the set it started with.
pub struct RuleEngine<S> {
    source: S,
    topology: Arc<TopologyCache>,
    rules: ArcSwap<RuleSet>,
    reload_claim: Mutex<()>,
    ttl: Duration,
}

impl<S: RuleSource> RuleEngine<S> {
    pub fn new(source: S, topology: Arc<TopologyCache>, ttl: Duration) -> Self {
        Self {
            source,
            topology,
            rules: ArcSwap::from_pointee(RuleSet::default()),
            reload_claim: Mutex::new(()),
            ttl,
        }
    }

    /// Refresh the ruleset from the store if it is stale (or `forced`).
    ///
    /// Concurrent callers serialize on an internal claim and re-check
    /// freshness under it, so at most one fetch runs per expiry. On
    /// fetch failure the previous ruleset stays active. Returns whether
    /// a refresh actually happened.
    pub async fn reload(&self, forced: bool) -> Result<bool, CoreError> {
        let _claim = self.reload_claim.lock().await;
        if !forced && !self.is_stale() {
            return Ok(false);
        }

        let rows = self.source.fetch_rules().await.inspect_err(
            |e| warn!(error = %e, "ruleset fetch failed, keeping previous rules"),
        )?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_definition(row) {
                Ok(rule) => rules.push(Arc::new(rule)),
                Err(e) => warn!(rule_id = row.rule_id, error = %e, "skipping invalid rule"),
            }
        }

        // Zero stored rows legitimately means "no rules": swap in the
        // empty set rather than keep evaluating a stale one.
        let set = RuleSet::from_rules(rules, Utc::now());
        info!(rules = set.len(), "ruleset loaded");
        self.rules.store(Arc::new(set));
        Ok(true)
    }

    fn is_stale(&self) -> bool {
        match self.rules.load().loaded_at {
            Some(at) => (Utc::now() - at).to_std().is_ok_and(|age| age > self.ttl),
            None => true,
        }
    }

    /// Validate and install a single rule, replacing any loaded rule
    /// with the same id.
    pub fn load_from_json(
        &self,
        rule_id: RuleId,
        name: Option<String>,
        requires_ack: bool,
        definition: Value,
    ) -> Result<(), CoreError> {
        let row = RuleRow {
            rule_id,
            name,
            requires_ack,
            definition,
        };
        let rule = Arc::new(parse_definition(&row)?);
        self.rules.rcu(|set| Arc::new(set.with_rule(Arc::clone(&rule))));
        Ok(())
    }

    /// Evaluate one hostname-keyed batch against the rules for `source`
    /// and return an event per `(rule, device)` match.
    ///
    /// Group targets expand to their transitive member devices; each
    /// member is evaluated against its own record. Devices without a
    /// record in the batch are skipped.
    pub fn evaluate(&self, source: RuleDataSource, batch: &FactsBatch) -> Vec<AlertEvent> {
        let set = self.rules.load();
        let mut events = Vec::new();

        for rule in set.for_source(source) {
            let Some(target) = self.topology.get_item(rule.target_item) else {
                debug!(rule_id = rule.rule_id, target = rule.target_item, "rule target not in topology");
                continue;
            };
            let devices = match target {
                TopologyItem::Device(device) => vec![device],
                TopologyItem::Group(group) => self.topology.devices_in_group(group.group_id),
            };

            for device in devices {
                let Some(record) = batch.get(&device.management_hostname) else {
                    continue;
                };
                if rule.matches(record) {
                    let value = rule.render_raised(record);
                    events.push(AlertEvent::raised(rule, &device, value));
                }
            }
        }

        events
    }

    pub fn topology(&self) -> &TopologyCache {
        &self.topology
    }

    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }

    pub fn rule_name(&self, rule_id: RuleId) -> Option<String> {
        self.rules.load().by_id.get(&rule_id).map(|r| r.name.clone())
    }

    /// All loaded rules in their wire form, for inspection endpoints.
    pub fn rules_as_json(&self) -> Value {
        let set = self.rules.load();
        let mut rules: Vec<&Arc<AlertRule>> = set.by_id.values().collect();
        rules.sort_by_key(|r| r.rule_id);
        serde_json::to_value(rules).unwrap_or(Value::Null)
    }
}
