//! Error types for quorumkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdkError>;

/// Errors surfaced to SDK callers.
///
/// Every public operation returns `Result<T, SdkError>`; background tasks
/// report terminal errors through the same type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("no leader reachable: {0}")]
    ClusterDown(String),

    #[error("key not found: {0}")]
    NoSuchKey(String),

    #[error("operation timeout: {0}")]
    Timeout(String),

    #[error("lock wait aborted: {0}")]
    LockFail(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Transport-level outcome of a single RPC against a single member.
///
/// Retryable variants are recovered inside the SDK via leader
/// re-resolution; the rest pass through to per-operation handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("not leader{}", .hint.as_deref().map(|h| format!(", redirected to {h}")).unwrap_or_default())]
    NotLeader { hint: Option<String> },

    #[error("member unavailable: {0}")]
    Unavailable(String),

    #[error("rpc deadline exceeded: {0}")]
    Timeout(String),

    #[error("no such key")]
    NoSuchKey,

    #[error("lock held by another session")]
    LockHeld,

    #[error("session expired")]
    SessionExpired,

    #[error("rpc failed: {0}")]
    Status(String),
}

impl RpcError {
    /// Is this recoverable by re-resolving the leader and retrying?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::NotLeader { .. }
                | RpcError::Unavailable(_)
                | RpcError::Timeout(_)
                | RpcError::Status(_)
        )
    }

    /// Map a gRPC status into the transport taxonomy.
    ///
    /// Inverse of the server-side convention: NotFound carries a missing
    /// key, FailedPrecondition carries a `leader` metadata hint,
    /// DeadlineExceeded is a timeout.
    pub fn from_grpc_status(status: tonic::Status) -> Self {
        use tonic::Code;
        match status.code() {
            Code::NotFound => RpcError::NoSuchKey,
            Code::AlreadyExists => RpcError::LockHeld,
            Code::Aborted => RpcError::SessionExpired,
            Code::FailedPrecondition => {
                let hint = status
                    .metadata()
                    .get("leader")
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                RpcError::NotLeader { hint }
            }
            Code::DeadlineExceeded => RpcError::Timeout(status.message().to_string()),
            Code::Unavailable => RpcError::Unavailable(status.message().to_string()),
            _ => RpcError::Status(status.message().to_string()),
        }
    }
}

impl From<tonic::transport::Error> for RpcError {
    fn from(e: tonic::transport::Error) -> Self {
        RpcError::Unavailable(e.to_string())
    }
}

impl SdkError {
    /// Terminal error for an exhausted leader-retry budget, shaped by the
    /// last transport failure observed.
    pub fn from_exhausted(last: RpcError) -> Self {
        match last {
            RpcError::Timeout(msg) => SdkError::Timeout(msg),
            other => SdkError::ClusterDown(other.to_string()),
        }
    }
}
