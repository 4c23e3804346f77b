//! RPC gateway: the point-to-point request/response seam between the SDK
//! and individual cluster members.
//!
//! The SDK core is written against the [`RpcGateway`] trait so the retry,
//! session, lock, and watch machinery stays independent of the transport.
//! [`grpc::GrpcGateway`] is the production implementation; tests supply an
//! in-memory cluster.

pub mod grpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::RpcError;

/// One key/value entry returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

/// One page of a range scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Entries in ascending key order
    pub entries: Vec<KvPair>,
    /// Whether more entries may exist past the last returned key
    pub has_more: bool,
}

/// Outcome of one watch long-poll round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPoll {
    /// The stored value differs from the baseline the client sent.
    /// `value` is the current state, `None` meaning the key is absent.
    Changed { value: Option<String> },
    /// Poll window lapsed with no change.
    Unchanged,
}

/// Read-only snapshot of one member, as reported by ShowCluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub server_id: String,
    pub status: i32,
    pub term: i64,
    pub last_log_index: i64,
    pub last_log_term: i64,
    pub commit_index: i64,
}

impl NodeInfo {
    pub fn node_status(&self) -> NodeStatus {
        NodeStatus::from_code(self.status)
    }

    pub fn is_leader(&self) -> bool {
        self.node_status() == NodeStatus::Leader
    }
}

/// Role a member reports for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Leader,
    Candidate,
    Follower,
    Offline,
}

impl NodeStatus {
    /// Map the wire code; unknown codes read as offline.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NodeStatus::Leader,
            1 => NodeStatus::Candidate,
            2 => NodeStatus::Follower,
            _ => NodeStatus::Offline,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Leader => write!(f, "leader"),
            NodeStatus::Candidate => write!(f, "candidate"),
            NodeStatus::Follower => write!(f, "follower"),
            NodeStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Display string for a raw wire status code.
pub fn status_to_string(code: i32) -> String {
    NodeStatus::from_code(code).to_string()
}

/// Point-to-point RPC surface of a single cluster member.
///
/// Methods take the member address explicitly; routing to the leader is
/// the caller's concern. Protocol outcomes (not-leader, missing key, held
/// lock, expired session) surface as [`RpcError`] variants, same as
/// transport failures, so the retry layer can classify both uniformly.
#[async_trait]
pub trait RpcGateway: Send + Sync {
    async fn put(&self, member: &str, key: &str, value: &str) -> Result<(), RpcError>;

    async fn get(&self, member: &str, key: &str) -> Result<String, RpcError>;

    async fn delete(&self, member: &str, key: &str) -> Result<(), RpcError>;

    async fn scan(
        &self,
        member: &str,
        start_key: &str,
        end_key: &str,
        limit: u32,
    ) -> Result<ScanPage, RpcError>;

    /// Conditional create-if-absent of `key`, tagged with `session_id`.
    async fn lock(&self, member: &str, key: &str, session_id: &str) -> Result<(), RpcError>;

    /// Long-poll for a change relative to `last_value` (`None` = absent).
    async fn watch(
        &self,
        member: &str,
        key: &str,
        session_id: &str,
        last_value: Option<&str>,
    ) -> Result<WatchPoll, RpcError>;

    async fn keep_alive(&self, member: &str, session_id: &str) -> Result<(), RpcError>;

    /// Answered by any member, not leader-restricted.
    async fn show_cluster(&self, member: &str) -> Result<Vec<NodeInfo>, RpcError>;
}
