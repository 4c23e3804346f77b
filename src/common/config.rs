//! Configuration for the quorumkv client

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::common::error::{Result, SdkError};

/// Client configuration.
///
/// Only `members` is mandatory; every tunable has a serde default so a
/// minimal TOML file (or a bare member list) is enough to construct one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Cluster member addresses (host:port), fixed for the client lifetime
    pub members: Vec<String>,

    /// Per-RPC deadline
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Rounds of full member-list probing before a call gives up
    #[serde(default = "default_leader_retry_rounds")]
    pub leader_retry_rounds: u32,

    /// Initial backoff between retry rounds (doubles per round)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Interval between keepalive renewals
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,

    /// Consecutive keepalive failures before the session is declared lost
    #[serde(default = "default_keepalive_failure_threshold")]
    pub keepalive_failure_threshold: u32,

    /// Initial backoff between lock attempts while the key is held
    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,

    /// Upper bound on the lock attempt backoff
    #[serde(default = "default_lock_backoff_cap_ms")]
    pub lock_backoff_cap_ms: u64,

    /// Server-side hold window for a watch long-poll
    #[serde(default = "default_watch_poll_timeout_ms")]
    pub watch_poll_timeout_ms: u64,

    /// Consecutive watch poll failures before the watch terminates
    #[serde(default = "default_watch_failure_threshold")]
    pub watch_failure_threshold: u32,

    /// Maximum entries fetched per scan page
    #[serde(default = "default_scan_batch_limit")]
    pub scan_batch_limit: u32,
}

fn default_rpc_timeout_ms() -> u64 {
    2_000
}
fn default_leader_retry_rounds() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    100
}
fn default_keepalive_interval_ms() -> u64 {
    2_000
}
fn default_keepalive_failure_threshold() -> u32 {
    5
}
fn default_lock_backoff_ms() -> u64 {
    50
}
fn default_lock_backoff_cap_ms() -> u64 {
    1_000
}
fn default_watch_poll_timeout_ms() -> u64 {
    10_000
}
fn default_watch_failure_threshold() -> u32 {
    5
}
fn default_scan_batch_limit() -> u32 {
    100
}

impl ClientConfig {
    /// Build a config from a member list, everything else at defaults.
    pub fn new(members: Vec<String>) -> Self {
        Self {
            members,
            rpc_timeout_ms: default_rpc_timeout_ms(),
            leader_retry_rounds: default_leader_retry_rounds(),
            retry_backoff_ms: default_retry_backoff_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
            keepalive_failure_threshold: default_keepalive_failure_threshold(),
            lock_backoff_ms: default_lock_backoff_ms(),
            lock_backoff_cap_ms: default_lock_backoff_cap_ms(),
            watch_poll_timeout_ms: default_watch_poll_timeout_ms(),
            watch_failure_threshold: default_watch_failure_threshold(),
            scan_batch_limit: default_scan_batch_limit(),
        }
    }

    /// Parse a comma-separated member list, e.g. `"a:7000,b:7000,c:7000"`.
    pub fn parse_members(list: &str) -> Result<Vec<String>> {
        let members: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if members.is_empty() {
            return Err(SdkError::InvalidConfig(
                "member list must name at least one server".into(),
            ));
        }
        Ok(members)
    }

    /// Load from a TOML file, applying serde defaults for absent fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| SdkError::InvalidConfig(e.to_string()))?;
        let cfg: ClientConfig = settings
            .try_deserialize()
            .map_err(|e| SdkError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(SdkError::InvalidConfig("no members configured".into()));
        }
        if self.leader_retry_rounds == 0 {
            return Err(SdkError::InvalidConfig(
                "leader_retry_rounds must be at least 1".into(),
            ));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(SdkError::InvalidConfig("rpc_timeout_ms must be non-zero".into()));
        }
        if self.scan_batch_limit == 0 {
            return Err(SdkError::InvalidConfig(
                "scan_batch_limit must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }
}
