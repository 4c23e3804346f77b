//! In-memory fake cluster shared by the integration tests.
//!
//! Implements the RPC gateway over a single process-local state machine:
//! one member is the scripted leader, the rest answer leader-bound calls
//! with a redirect, and test knobs inject member outages, keepalive
//! failures, and server-side session expiry.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use quorumkv::{ClientConfig, KvPair, NodeInfo, QuorumClient, RpcError, RpcGateway};
use quorumkv::rpc::{ScanPage, WatchPoll};

const WATCH_WINDOW: Duration = Duration::from_millis(100);

pub struct FakeCluster {
    members: Vec<String>,
    leader: Mutex<Option<usize>>,
    down: Mutex<HashSet<String>>,
    kv: Mutex<BTreeMap<String, String>>,
    locks: Mutex<HashMap<String, String>>,
    expired: Mutex<HashSet<String>>,
    renewals: Mutex<HashMap<String, u64>>,
    fail_keepalives: AtomicBool,
    change: Notify,
}

impl FakeCluster {
    pub fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            members: (0..size).map(|i| format!("m{i}:7000")).collect(),
            leader: Mutex::new(Some(0)),
            down: Mutex::new(HashSet::new()),
            kv: Mutex::new(BTreeMap::new()),
            locks: Mutex::new(HashMap::new()),
            expired: Mutex::new(HashSet::new()),
            renewals: Mutex::new(HashMap::new()),
            fail_keepalives: AtomicBool::new(false),
            change: Notify::new(),
        })
    }

    pub fn members(&self) -> Vec<String> {
        self.members.clone()
    }

    pub fn set_leader(&self, idx: Option<usize>) {
        *self.leader.lock().unwrap() = idx;
    }

    pub fn take_down(&self, member: &str) {
        self.down.lock().unwrap().insert(member.to_string());
    }

    pub fn take_down_all(&self) {
        let mut down = self.down.lock().unwrap();
        for m in &self.members {
            down.insert(m.clone());
        }
    }

    pub fn restore(&self, member: &str) {
        self.down.lock().unwrap().remove(member);
    }

    pub fn fail_keepalives(&self, fail: bool) {
        self.fail_keepalives.store(fail, Ordering::SeqCst);
    }

    /// Server-side session expiry: forgets the session and frees its locks.
    pub fn expire_session(&self, session_id: &str) {
        self.expired.lock().unwrap().insert(session_id.to_string());
        self.locks
            .lock()
            .unwrap()
            .retain(|_, holder| holder != session_id);
        self.change.notify_waiters();
    }

    /// Mutate state server-side, bypassing the client under test.
    pub fn store(&self, key: &str, value: &str) {
        self.kv
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.change.notify_waiters();
    }

    pub fn erase(&self, key: &str) {
        self.kv.lock().unwrap().remove(key);
        self.change.notify_waiters();
    }

    pub fn holder_of(&self, key: &str) -> Option<String> {
        self.locks.lock().unwrap().get(key).cloned()
    }

    pub fn renewal_count(&self, session_id: &str) -> u64 {
        self.renewals
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    fn check_reachable(&self, member: &str) -> Result<(), RpcError> {
        if self.down.lock().unwrap().contains(member) {
            return Err(RpcError::Unavailable(format!("{member} is down")));
        }
        Ok(())
    }

    fn check_leader(&self, member: &str) -> Result<(), RpcError> {
        self.check_reachable(member)?;
        let leader = self.leader.lock().unwrap();
        match leader.as_ref().map(|i| self.members[*i].clone()) {
            Some(addr) if addr == member => Ok(()),
            hint => Err(RpcError::NotLeader { hint }),
        }
    }

    fn current(&self, key: &str) -> Option<String> {
        self.kv.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl RpcGateway for FakeCluster {
    async fn put(&self, member: &str, key: &str, value: &str) -> Result<(), RpcError> {
        self.check_leader(member)?;
        let changed = {
            let mut kv = self.kv.lock().unwrap();
            kv.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            self.change.notify_waiters();
        }
        Ok(())
    }

    async fn get(&self, member: &str, key: &str) -> Result<String, RpcError> {
        self.check_leader(member)?;
        self.current(key).ok_or(RpcError::NoSuchKey)
    }

    async fn delete(&self, member: &str, key: &str) -> Result<(), RpcError> {
        self.check_leader(member)?;
        let removed = self.kv.lock().unwrap().remove(key).is_some();
        if removed {
            self.change.notify_waiters();
            Ok(())
        } else {
            Err(RpcError::NoSuchKey)
        }
    }

    async fn scan(
        &self,
        member: &str,
        start_key: &str,
        end_key: &str,
        limit: u32,
    ) -> Result<ScanPage, RpcError> {
        self.check_leader(member)?;
        if start_key >= end_key {
            return Ok(ScanPage::default());
        }
        let kv = self.kv.lock().unwrap();
        let in_range: Vec<KvPair> = kv
            .range(start_key.to_string()..end_key.to_string())
            .map(|(k, v)| KvPair {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();
        let has_more = in_range.len() > limit as usize;
        Ok(ScanPage {
            entries: in_range.into_iter().take(limit as usize).collect(),
            has_more,
        })
    }

    async fn lock(&self, member: &str, key: &str, session_id: &str) -> Result<(), RpcError> {
        self.check_leader(member)?;
        if self.expired.lock().unwrap().contains(session_id) {
            return Err(RpcError::SessionExpired);
        }
        let mut locks = self.locks.lock().unwrap();
        match locks.get(key) {
            None => {
                locks.insert(key.to_string(), session_id.to_string());
                Ok(())
            }
            Some(holder) if holder == session_id => Ok(()),
            Some(_) => Err(RpcError::LockHeld),
        }
    }

    async fn watch(
        &self,
        member: &str,
        key: &str,
        _session_id: &str,
        last_value: Option<&str>,
    ) -> Result<WatchPoll, RpcError> {
        self.check_leader(member)?;
        let deadline = tokio::time::Instant::now() + WATCH_WINDOW;
        loop {
            let current = self.current(key);
            if current.as_deref() != last_value {
                return Ok(WatchPoll::Changed { value: current });
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(WatchPoll::Unchanged);
            }
            let wait = (deadline - now).min(Duration::from_millis(20));
            let _ = tokio::time::timeout(wait, self.change.notified()).await;
        }
    }

    async fn keep_alive(&self, member: &str, session_id: &str) -> Result<(), RpcError> {
        self.check_leader(member)?;
        if self.fail_keepalives.load(Ordering::SeqCst) {
            return Err(RpcError::Unavailable("keepalive failure injected".into()));
        }
        if self.expired.lock().unwrap().contains(session_id) {
            return Err(RpcError::SessionExpired);
        }
        *self
            .renewals
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn show_cluster(&self, member: &str) -> Result<Vec<NodeInfo>, RpcError> {
        self.check_reachable(member)?;
        let leader = *self.leader.lock().unwrap();
        let down = self.down.lock().unwrap();
        Ok(self
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| NodeInfo {
                server_id: m.clone(),
                status: if down.contains(m) {
                    3
                } else if leader == Some(i) {
                    0
                } else {
                    2
                },
                term: 1,
                last_log_index: 1,
                last_log_term: 1,
                commit_index: 1,
            })
            .collect())
    }
}

/// Config tuned for fast test turnaround.
pub fn test_config(members: Vec<String>) -> ClientConfig {
    let mut config = ClientConfig::new(members);
    config.rpc_timeout_ms = 500;
    config.leader_retry_rounds = 3;
    config.retry_backoff_ms = 10;
    config.keepalive_interval_ms = 20;
    config.keepalive_failure_threshold = 3;
    config.lock_backoff_ms = 10;
    config.lock_backoff_cap_ms = 50;
    config.watch_poll_timeout_ms = 200;
    config.watch_failure_threshold = 3;
    config.scan_batch_limit = 100;
    config
}

pub fn client_for(cluster: &Arc<FakeCluster>) -> QuorumClient {
    QuorumClient::with_gateway(test_config(cluster.members()), cluster.clone())
        .expect("client construction")
}
