// ── Runtime engine configuration ──
//
// Built by the embedding process and handed to the composition root;
// the core never reads config files or the environment.

use std::time::Duration;

/// Tuning for the alert subsystem.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Advisory staleness threshold for the topology cache. The cache
    /// performs no I/O itself; callers consult `should_update`.
    pub topology_ttl: Duration,

    /// How long a loaded ruleset stays fresh before an unforced
    /// `reload` re-fetches it.
    pub ruleset_ttl: Duration,

    /// Capacity of the facts input queue.
    pub facts_channel_size: usize,

    /// Capacity of the syslog input queue.
    pub syslog_channel_size: usize,

    /// Capacity of the shared delivery queue.
    pub delivery_channel_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topology_ttl: Duration::from_secs(60),
            ruleset_ttl: Duration::from_secs(3600),
            facts_channel_size: 64,
            syslog_channel_size: 64,
            delivery_channel_size: 64,
        }
    }
}
