//! gRPC implementation of the RPC gateway

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tonic::transport::Channel;

use crate::common::RpcError;
use crate::proto::quorum_kv_client::QuorumKvClient;
use crate::proto::{self, RpcStatus};
use crate::rpc::{KvPair, NodeInfo, RpcGateway, ScanPage, WatchPoll};

/// Gateway speaking the quorumkv gRPC protocol.
///
/// Channels are dialed lazily and cached per member; a transport failure
/// evicts the cached channel so the next attempt re-dials.
pub struct GrpcGateway {
    channels: Mutex<HashMap<String, QuorumKvClient<Channel>>>,
    rpc_timeout: Duration,
    watch_poll_timeout: Duration,
}

impl GrpcGateway {
    pub fn new(rpc_timeout: Duration, watch_poll_timeout: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            rpc_timeout,
            watch_poll_timeout,
        }
    }

    async fn client_for(&self, member: &str) -> Result<QuorumKvClient<Channel>, RpcError> {
        let mut channels = self.channels.lock().await;
        if let Some(client) = channels.get(member) {
            return Ok(client.clone());
        }
        let endpoint = format!("http://{member}");
        let client = tokio::time::timeout(self.rpc_timeout, QuorumKvClient::connect(endpoint))
            .await
            .map_err(|_| RpcError::Timeout(format!("dial to {member} exceeded deadline")))?
            .map_err(RpcError::from)?;
        channels.insert(member.to_string(), client.clone());
        Ok(client)
    }

    async fn evict(&self, member: &str) {
        self.channels.lock().await.remove(member);
    }

    /// Run one RPC with the configured deadline, evicting the channel on
    /// transport-level failure.
    async fn call<T, F>(&self, member: &str, fut: F) -> Result<T, RpcError>
    where
        F: std::future::Future<Output = Result<T, tonic::Status>>,
    {
        let outcome = tokio::time::timeout(self.rpc_timeout, fut).await;
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(status)) => {
                let err = RpcError::from_grpc_status(status);
                if matches!(err, RpcError::Unavailable(_)) {
                    self.evict(member).await;
                }
                Err(err)
            }
            Err(_) => {
                self.evict(member).await;
                Err(RpcError::Timeout(format!("rpc to {member} exceeded deadline")))
            }
        }
    }
}

/// Translate an in-band protocol status into the transport taxonomy.
fn check_status(status: i32, leader_hint: &str) -> Result<(), RpcError> {
    match RpcStatus::try_from(status).unwrap_or(RpcStatus::Error) {
        RpcStatus::Ok => Ok(()),
        RpcStatus::NotLeader => Err(RpcError::NotLeader {
            hint: if leader_hint.is_empty() {
                None
            } else {
                Some(leader_hint.to_string())
            },
        }),
        RpcStatus::NoSuchKey => Err(RpcError::NoSuchKey),
        RpcStatus::LockHeld => Err(RpcError::LockHeld),
        RpcStatus::SessionExpired => Err(RpcError::SessionExpired),
        RpcStatus::Error => Err(RpcError::Status("member reported an internal error".into())),
    }
}

#[async_trait]
impl RpcGateway for GrpcGateway {
    async fn put(&self, member: &str, key: &str, value: &str) -> Result<(), RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        };
        let resp = self
            .call(member, async move {
                client.put(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)
    }

    async fn get(&self, member: &str, key: &str) -> Result<String, RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::GetRequest {
            key: key.to_string(),
        };
        let resp = self
            .call(member, async move {
                client.get(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)?;
        Ok(resp.value)
    }

    async fn delete(&self, member: &str, key: &str) -> Result<(), RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::DeleteRequest {
            key: key.to_string(),
        };
        let resp = self
            .call(member, async move {
                client.delete(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)
    }

    async fn scan(
        &self,
        member: &str,
        start_key: &str,
        end_key: &str,
        limit: u32,
    ) -> Result<ScanPage, RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::ScanRequest {
            start_key: start_key.to_string(),
            end_key: end_key.to_string(),
            limit,
        };
        let resp = self
            .call(member, async move {
                client.scan(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)?;
        Ok(ScanPage {
            entries: resp
                .entries
                .into_iter()
                .map(|e| KvPair {
                    key: e.key,
                    value: e.value,
                })
                .collect(),
            has_more: resp.has_more,
        })
    }

    async fn lock(&self, member: &str, key: &str, session_id: &str) -> Result<(), RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::LockRequest {
            key: key.to_string(),
            session_id: session_id.to_string(),
        };
        let resp = self
            .call(member, async move {
                client.lock(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)
    }

    async fn watch(
        &self,
        member: &str,
        key: &str,
        session_id: &str,
        last_value: Option<&str>,
    ) -> Result<WatchPoll, RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::WatchRequest {
            key: key.to_string(),
            session_id: session_id.to_string(),
            last_value: last_value.unwrap_or_default().to_string(),
            last_has_key: last_value.is_some(),
        };
        // The server may hold a watch for its full poll window, so the
        // deadline here is the window plus the normal RPC allowance.
        let deadline = self.watch_poll_timeout + self.rpc_timeout;
        let outcome = tokio::time::timeout(deadline, async move {
            client.watch(req).await.map(|r| r.into_inner())
        })
        .await;
        let resp = match outcome {
            Ok(Ok(resp)) => resp,
            Ok(Err(status)) => {
                let err = RpcError::from_grpc_status(status);
                if matches!(err, RpcError::Unavailable(_)) {
                    self.evict(member).await;
                }
                return Err(err);
            }
            Err(_) => {
                self.evict(member).await;
                return Err(RpcError::Timeout(format!(
                    "watch poll to {member} exceeded deadline"
                )));
            }
        };
        check_status(resp.status, &resp.leader_hint)?;
        if !resp.changed {
            return Ok(WatchPoll::Unchanged);
        }
        Ok(WatchPoll::Changed {
            value: resp.has_key.then_some(resp.value),
        })
    }

    async fn keep_alive(&self, member: &str, session_id: &str) -> Result<(), RpcError> {
        let mut client = self.client_for(member).await?;
        let req = proto::KeepAliveRequest {
            session_id: session_id.to_string(),
        };
        let resp = self
            .call(member, async move {
                client.keep_alive(req).await.map(|r| r.into_inner())
            })
            .await?;
        check_status(resp.status, &resp.leader_hint)
    }

    async fn show_cluster(&self, member: &str) -> Result<Vec<NodeInfo>, RpcError> {
        let mut client = self.client_for(member).await?;
        let resp = self
            .call(member, async move {
                client
                    .show_cluster(proto::ShowClusterRequest {})
                    .await
                    .map(|r| r.into_inner())
            })
            .await?;
        Ok(resp
            .nodes
            .into_iter()
            .map(|n| NodeInfo {
                server_id: n.server_id,
                status: n.status,
                term: n.term,
                last_log_index: n.last_log_index,
                last_log_term: n.last_log_term,
                commit_index: n.commit_index,
            })
            .collect())
    }
}
