// ── Syslog message model ──
//
// One record per received message, as handed over by the syslog listener
// thread. `as_record` reshapes a message into the same hostname-keyed
// record form the facts stream uses, so syslog rules share the accessor
// machinery with fact rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};

use super::FactsBatch;

/// RFC 3164/5424 severity, in protocol order (0 = most severe).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyslogSeverity {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl SyslogSeverity {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Emerg),
            1 => Some(Self::Alert),
            2 => Some(Self::Crit),
            3 => Some(Self::Err),
            4 => Some(Self::Warning),
            5 => Some(Self::Notice),
            6 => Some(Self::Info),
            7 => Some(Self::Debug),
            _ => None,
        }
    }
}

/// RFC 3164/5424 facility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SyslogFacility {
    Kern = 0,
    User = 1,
    Mail = 2,
    Daemon = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Uucp = 8,
    Cron = 9,
    AuthPriv = 10,
    Ftp = 11,
    Ntp = 12,
    Audit = 13,
    Console = 14,
    Clock = 15,
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

impl SyslogFacility {
    pub fn from_code(code: u8) -> Option<Self> {
        // PRI facility field is `priority / 8`, capped at local7.
        match code {
            0 => Some(Self::Kern),
            1 => Some(Self::User),
            2 => Some(Self::Mail),
            3 => Some(Self::Daemon),
            4 => Some(Self::Auth),
            5 => Some(Self::Syslog),
            6 => Some(Self::Lpr),
            7 => Some(Self::News),
            8 => Some(Self::Uucp),
            9 => Some(Self::Cron),
            10 => Some(Self::AuthPriv),
            11 => Some(Self::Ftp),
            12 => Some(Self::Ntp),
            13 => Some(Self::Audit),
            14 => Some(Self::Console),
            15 => Some(Self::Clock),
            16 => Some(Self::Local0),
            17 => Some(Self::Local1),
            18 => Some(Self::Local2),
            19 => Some(Self::Local3),
            20 => Some(Self::Local4),
            21 => Some(Self::Local5),
            22 => Some(Self::Local6),
            23 => Some(Self::Local7),
            _ => None,
        }
    }
}

/// One received syslog message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogMessage {
    pub facility: SyslogFacility,
    pub severity: SyslogSeverity,

    #[serde(rename = "from-host")]
    pub from_host: String,

    #[serde(rename = "received-at")]
    pub received_at: DateTime<Utc>,

    #[serde(rename = "tag")]
    pub syslog_tag: String,

    #[serde(rename = "process-id")]
    pub process_id: Option<String>,

    #[serde(rename = "device-reported-time")]
    pub device_reported_time: Option<DateTime<Utc>>,

    pub message: String,
}

impl SyslogMessage {
    /// Reshape into a one-host fact record so rule accessors can address
    /// the message fields (`&message`, `&severity`, `&tag`, ...).
    pub fn as_record(&self) -> FactsBatch {
        let mut record = FactsBatch::new();
        record.insert(
            self.from_host.clone(),
            json!({
                "facility": self.facility.to_string(),
                "severity": self.severity.to_string(),
                "priority": self.severity as u8,
                "tag": self.syslog_tag,
                "process_id": self.process_id,
                "message": self.message,
                "received_at": self.received_at.timestamp(),
            }),
        );
        record
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message() -> SyslogMessage {
        SyslogMessage {
            facility: SyslogFacility::Daemon,
            severity: SyslogSeverity::Err,
            from_host: "edge-fw-1".into(),
            received_at: Utc::now(),
            syslog_tag: "bgpd".into(),
            process_id: Some("917".into()),
            device_reported_time: None,
            message: "neighbor 10.0.0.2 down".into(),
        }
    }

    #[test]
    fn record_is_keyed_by_source_host() {
        let record = message().as_record();
        let fields = record.get("edge-fw-1").unwrap();
        assert_eq!(fields["message"], "neighbor 10.0.0.2 down");
        assert_eq!(fields["severity"], "err");
        assert_eq!(fields["priority"], 3);
    }

    #[test]
    fn facility_decoding_rejects_out_of_range() {
        assert_eq!(SyslogFacility::from_code(23), Some(SyslogFacility::Local7));
        assert_eq!(SyslogFacility::from_code(24), None);
        assert_eq!(SyslogSeverity::from_code(8), None);
    }
}
