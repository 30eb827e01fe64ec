//! Process-wide configuration, loaded once by the binary
//! and handed into [`crate::context::BanchoContext`] rather than read as a
//! hidden global.

use serde::Deserialize;

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_displace_threshold_secs() -> i64 {
    10
}

fn default_idle_timeout_secs() -> i64 {
    30
}

fn default_request_deadline_ms() -> u64 {
    10_000
}

fn default_welcome_message() -> String {
    "Welcome to the server.".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanchoConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// A same-name re-login within this window is refused rather than
    /// displacing the existing session.
    #[serde(default = "default_displace_threshold_secs")]
    pub displace_threshold_secs: i64,

    /// A player whose `last_ping_time` is older than this is logged out by
    /// the periodic sweep.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: i64,

    /// Per-request deadline bounding the SessionLoop.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
}

impl Default for BanchoConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            displace_threshold_secs: default_displace_threshold_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            request_deadline_ms: default_request_deadline_ms(),
            welcome_message: default_welcome_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_thresholds() {
        let cfg = BanchoConfig::default();
        assert_eq!(cfg.displace_threshold_secs, 10);
        assert_eq!(cfg.command_prefix, "!");
    }
}
