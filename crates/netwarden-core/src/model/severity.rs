// ── Alert severity ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Syslog-style severity attached to alert rules and raised events.
///
/// Variants are declared in ascending order so the derived `Ord` ranks
/// `Emergency` highest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AlertSeverity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}
