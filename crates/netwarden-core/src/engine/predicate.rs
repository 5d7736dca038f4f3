// ── Alert predicates ──
//
// One predicate compares two operands, each either a constant from the
// rule definition or an accessor into the per-device record. In the rule
// JSON an operand string starting with `&` is an accessor; everything
// else is a constant. Accessor misses and type mismatches make the
// predicate evaluate to false, never error.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

// ── Accessors ──────────────────────────────────────────────────────────

/// A path into a nested record, `&cpu>load>1m` style: segments separated
/// by `>`, resolved object-key by object-key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorPath {
    raw: String,
    segments: Vec<String>,
}

impl AccessorPath {
    pub fn new(path: impl Into<String>) -> Self {
        let raw = path.into();
        let segments = raw.split('>').map(str::to_owned).collect();
        Self { raw, segments }
    }

    /// The path as written in the rule, without the `&` sentinel.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk the record. Any missing key or non-object intermediate
    /// resolves to `None`.
    pub fn resolve<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for AccessorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.raw)
    }
}

// ── Operations ─────────────────────────────────────────────────────────

/// Comparison applied between the two operands.
///
/// Rule JSON spells these in snake_case (`more_than`); rendered alert
/// values use the screaming form (`MORE_THAN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    MoreThan,
    MoreThanEqual,
    LessThan,
    LessThanEqual,
    Equal,
    NotEqual,
    Contains,
}

impl PredicateOp {
    pub fn eval(self, left: &Value, right: &Value) -> bool {
        match self {
            Self::MoreThan => matches!(compare_numeric(left, right), Some(Ordering::Greater)),
            Self::MoreThanEqual => matches!(
                compare_numeric(left, right),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::LessThan => matches!(compare_numeric(left, right), Some(Ordering::Less)),
            Self::LessThanEqual => matches!(
                compare_numeric(left, right),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Equal => values_equal(left, right),
            Self::NotEqual => !values_equal(left, right),
            Self::Contains => eval_contains(left, right),
        }
    }
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MoreThan => "MORE_THAN",
            Self::MoreThanEqual => "MORE_THAN_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessThanEqual => "LESS_THAN_EQUAL",
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::Contains => "CONTAINS",
        };
        f.write_str(s)
    }
}

impl FromStr for PredicateOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "more_than" => Ok(Self::MoreThan),
            "more_than_equal" => Ok(Self::MoreThanEqual),
            "less_than" => Ok(Self::LessThan),
            "less_than_equal" => Ok(Self::LessThanEqual),
            "equal" => Ok(Self::Equal),
            "not_equal" => Ok(Self::NotEqual),
            "contains" => Ok(Self::Contains),
            other => Err(format!("unknown predicate operation '{other}'")),
        }
    }
}

/// Ordering comparisons are defined for numbers only. Integer pairs
/// compare exactly; mixed pairs go through f64.
fn compare_numeric(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return Some(l.cmp(&r));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

/// Equality over any value type, with `1` == `1.0` for numbers.
fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_number() && right.is_number() {
        return matches!(compare_numeric(left, right), Some(Ordering::Equal));
    }
    left == right
}

/// `contains` is left-in-right membership: the right operand must be a
/// string (substring match against the rendered left operand) or an
/// array (a member equal to the left operand).
fn eval_contains(left: &Value, right: &Value) -> bool {
    match right {
        Value::String(haystack) => {
            let needle = match left {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    debug!("contains: left operand is not a scalar");
                    return false;
                }
            };
            haystack.contains(&needle)
        }
        Value::Array(items) => items.iter().any(|item| values_equal(item, left)),
        _ => {
            debug!("contains: right operand is not a string or array");
            false
        }
    }
}

// ── Predicates ─────────────────────────────────────────────────────────

/// A single rule condition. At most one side is a constant; a definition
/// with two constants is rejected at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertPredicate {
    LeftConst(Value, PredicateOp, AccessorPath),
    RightConst(AccessorPath, PredicateOp, Value),
    Variable(AccessorPath, PredicateOp, AccessorPath),
}

impl AlertPredicate {
    /// Evaluate against one device record. Unresolvable accessors make
    /// the predicate false.
    pub fn eval(&self, record: &Value) -> bool {
        let (Some(left), Some(right)) = (self.eval_left(record), self.eval_right(record)) else {
            return false;
        };
        self.op().eval(left, right)
    }

    /// Concrete left operand, if resolvable.
    pub fn eval_left<'a>(&'a self, record: &'a Value) -> Option<&'a Value> {
        match self {
            Self::LeftConst(value, _, _) => Some(value),
            Self::RightConst(accessor, _, _) | Self::Variable(accessor, _, _) => {
                accessor.resolve(record)
            }
        }
    }

    /// Concrete right operand, if resolvable.
    pub fn eval_right<'a>(&'a self, record: &'a Value) -> Option<&'a Value> {
        match self {
            Self::RightConst(_, _, value) => Some(value),
            Self::LeftConst(_, _, accessor) | Self::Variable(_, _, accessor) => {
                accessor.resolve(record)
            }
        }
    }

    pub fn op(&self) -> PredicateOp {
        match self {
            Self::LeftConst(_, op, _) | Self::RightConst(_, op, _) | Self::Variable(_, op, _) => {
                *op
            }
        }
    }
}

/// Render an operand for alert values: bare strings, JSON otherwise.
pub(crate) fn render_operand(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Wire form ──────────────────────────────────────────────────────────

impl Serialize for AlertPredicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        match self {
            Self::LeftConst(value, op, accessor) => {
                map.serialize_entry("left", value)?;
                map.serialize_entry("op", op)?;
                map.serialize_entry("right", &accessor.to_string())?;
            }
            Self::RightConst(accessor, op, value) => {
                map.serialize_entry("left", &accessor.to_string())?;
                map.serialize_entry("op", op)?;
                map.serialize_entry("right", value)?;
            }
            Self::Variable(left, op, right) => {
                map.serialize_entry("left", &left.to_string())?;
                map.serialize_entry("op", op)?;
                map.serialize_entry("right", &right.to_string())?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AlertPredicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            left: Value,
            op: PredicateOp,
            right: Value,
        }

        let raw = Raw::deserialize(deserializer)?;
        let left = classify(raw.left);
        let right = classify(raw.right);

        match (left, right) {
            (Operand::Accessor(l), Operand::Accessor(r)) => {
                Ok(Self::Variable(l, raw.op, r))
            }
            (Operand::Accessor(l), Operand::Constant(r)) => {
                Ok(Self::RightConst(l, raw.op, r))
            }
            (Operand::Constant(l), Operand::Accessor(r)) => {
                Ok(Self::LeftConst(l, raw.op, r))
            }
            (Operand::Constant(_), Operand::Constant(_)) => Err(D::Error::custom(
                "predicate cannot have constants on both sides",
            )),
        }
    }
}

enum Operand {
    Accessor(AccessorPath),
    Constant(Value),
}

fn classify(value: Value) -> Operand {
    match value {
        Value::String(s) => match s.strip_prefix('&') {
            Some(path) => Operand::Accessor(AccessorPath::new(path)),
            None => Operand::Constant(Value::String(s)),
        },
        other => Operand::Constant(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessor_walks_nested_objects() {
        let record = json!({"cpu": {"load": {"1m": 0.75}}});
        let path = AccessorPath::new("cpu>load>1m");
        assert_eq!(path.resolve(&record), Some(&json!(0.75)));

        assert!(AccessorPath::new("cpu>temp").resolve(&record).is_none());
        assert!(AccessorPath::new("cpu>load>1m>deeper").resolve(&record).is_none());
    }

    #[test]
    fn relational_ops_are_numeric_only() {
        let op = PredicateOp::MoreThan;
        assert!(op.eval(&json!(95), &json!(90)));
        assert!(op.eval(&json!(90.5), &json!(90)));
        assert!(!op.eval(&json!(90), &json!(90)));
        assert!(!op.eval(&json!("95"), &json!(90)));
        assert!(!op.eval(&json!(null), &json!(90)));

        assert!(PredicateOp::MoreThanEqual.eval(&json!(90), &json!(90)));
        assert!(PredicateOp::LessThan.eval(&json!(1), &json!(2)));
        assert!(PredicateOp::LessThanEqual.eval(&json!(2), &json!(2)));
    }

    #[test]
    fn equality_bridges_integer_and_float() {
        assert!(PredicateOp::Equal.eval(&json!(1), &json!(1.0)));
        assert!(PredicateOp::NotEqual.eval(&json!(1), &json!("1")));
        assert!(PredicateOp::Equal.eval(&json!("up"), &json!("up")));
        assert!(!PredicateOp::Equal.eval(&json!("up"), &json!("down")));
    }

    #[test]
    fn contains_is_left_in_right_membership() {
        let op = PredicateOp::Contains;
        assert!(op.eval(&json!("down"), &json!("eth0 went down")));
        assert!(op.eval(&json!(42), &json!("error code 42")));
        assert!(!op.eval(&json!("down"), &json!("all good")));

        // Case-sensitive, matching the stored-rule contract.
        assert!(!op.eval(&json!("down"), &json!("BGP neighbor DOWN")));

        assert!(op.eval(&json!("eth1"), &json!(["eth0", "eth1"])));
        assert!(!op.eval(&json!("eth9"), &json!(["eth0"])));

        // Right must be a string or array.
        assert!(!op.eval(&json!(4), &json!(42)));
    }

    #[test]
    fn op_names_round_trip() {
        for name in [
            "more_than",
            "more_than_equal",
            "less_than",
            "less_than_equal",
            "equal",
            "not_equal",
            "contains",
        ] {
            let op: PredicateOp = name.parse().unwrap();
            assert_eq!(op.to_string(), name.to_uppercase());
        }
        assert!("sounds_like".parse::<PredicateOp>().is_err());
    }

    #[test]
    fn ampersand_marks_accessors() {
        let pred: AlertPredicate =
            serde_json::from_value(json!({"left": "&cpu_load", "op": "more_than", "right": 90}))
                .unwrap();
        assert!(matches!(pred, AlertPredicate::RightConst(_, PredicateOp::MoreThan, _)));
        assert!(pred.eval(&json!({"cpu_load": 95})));
        assert!(!pred.eval(&json!({"cpu_load": 42})));
        assert!(!pred.eval(&json!({"mem_free": 10})));
    }

    #[test]
    fn two_accessor_predicate_compares_record_fields() {
        let pred: AlertPredicate = serde_json::from_value(
            json!({"left": "&rx_errors", "op": "more_than", "right": "&rx_error_budget"}),
        )
        .unwrap();
        assert!(pred.eval(&json!({"rx_errors": 12, "rx_error_budget": 5})));
        assert!(!pred.eval(&json!({"rx_errors": 2, "rx_error_budget": 5})));
    }

    #[test]
    fn double_constant_is_rejected() {
        let result: Result<AlertPredicate, _> =
            serde_json::from_value(json!({"left": 1, "op": "equal", "right": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn serialization_restores_the_ampersand() {
        let original = json!({"left": "&uptime", "op": "less_than", "right": 300});
        let pred: AlertPredicate = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(serde_json::to_value(&pred).unwrap(), original);
    }
}
