//! # quorumkv
//!
//! Client SDK for a quorum-based coordination service: a leader-elected
//! key/value store with distributed locks and change notification.
//!
//! The SDK talks to a fixed set of member servers, exactly one of which is
//! the elected leader at a time. It handles:
//! - Leader discovery and failover (cached leader, bounded re-probing)
//! - A per-client session, renewed by a background keepalive loop
//! - Blocking distributed locks bound to the session
//! - Asynchronous watches delivering ordered, at-most-once transitions
//! - Paginated range scans
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────────────────┐
//!            │          Member Cluster          │
//!            │  leader ◄─ raft ─► followers     │
//!            └───▲───────────▲───────────▲──────┘
//!                │ gRPC      │           │
//!   ┌────────────┴───────────┴───────────┴─────┐
//!   │               QuorumClient               │
//!   │  leader cache │ session + keepalive task │
//!   │  lock waiters │ watch tasks │ scan pages │
//!   └──────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use quorumkv::{ClientConfig, QuorumClient};
//!
//! # async fn demo() -> quorumkv::Result<()> {
//! let members = ClientConfig::parse_members("10.0.0.1:7000,10.0.0.2:7000,10.0.0.3:7000")?;
//! let client = QuorumClient::connect(ClientConfig::new(members)).await?;
//!
//! client.put("config/limit", "200").await?;
//! let value = client.get("config/limit").await?;
//!
//! client.watch("config/limit", Box::new(|event| {
//!     if let Ok(event) = event {
//!         println!("{} changed: {:?} -> {:?}", event.key, event.old_value, event.new_value);
//!     }
//! }))?;
//!
//! client.lock("locks/rebalance").await?;
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod rpc;

// Re-export commonly used types
pub use client::{QuorumClient, ScanResult, SessionSnapshot, WatchCallback, WatchEvent};
pub use common::{ClientConfig, Result, RpcError, SdkError};
pub use rpc::{status_to_string, KvPair, NodeInfo, NodeStatus, RpcGateway};

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("quorumkv");
}

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
