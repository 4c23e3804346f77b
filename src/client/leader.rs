//! Leader discovery and the cached-leader fast path
//!
//! The cache is best-effort: a not-leader reply from any member is ground
//! truth and corrects it, either to the hinted address or by forcing a
//! fresh probe of the member list.

use std::sync::Mutex;

use crate::common::{Result, RpcError, SdkError};
use crate::rpc::RpcGateway;

pub(crate) struct LeaderLocator {
    members: Vec<String>,
    cached: Mutex<Option<String>>,
}

impl LeaderLocator {
    pub(crate) fn new(members: Vec<String>) -> Self {
        Self {
            members,
            cached: Mutex::new(None),
        }
    }

    pub(crate) fn members(&self) -> &[String] {
        &self.members
    }

    pub(crate) fn cached(&self) -> Option<String> {
        self.cached.lock().unwrap().clone()
    }

    /// Fold a failed call against `member` back into the cache.
    ///
    /// A hinted redirect installs the hint directly; anything else only
    /// clears the cache if it still points at the failed member, so a
    /// concurrent discovery is never clobbered.
    pub(crate) fn correct(&self, member: &str, err: &RpcError) {
        let mut cached = self.cached.lock().unwrap();
        match err {
            RpcError::NotLeader { hint: Some(hint) } if self.members.contains(hint) => {
                tracing::debug!(from = member, to = %hint, "leader redirect");
                *cached = Some(hint.clone());
            }
            _ => {
                if cached.as_deref() == Some(member) {
                    *cached = None;
                }
            }
        }
    }

    /// Current leader, cached or discovered by one pass over the member
    /// list. Any member may answer ShowCluster; the first response naming
    /// a live leader wins.
    pub(crate) async fn resolve(&self, gateway: &dyn RpcGateway) -> Result<String> {
        if let Some(leader) = self.cached() {
            return Ok(leader);
        }

        let mut last_err: Option<RpcError> = None;
        for member in &self.members {
            match gateway.show_cluster(member).await {
                Ok(nodes) => {
                    let found = nodes
                        .iter()
                        .find(|n| n.is_leader())
                        .map(|n| n.server_id.clone());
                    match found {
                        Some(leader) if self.members.contains(&leader) => {
                            tracing::debug!(%leader, via = %member, "leader discovered");
                            *self.cached.lock().unwrap() = Some(leader.clone());
                            return Ok(leader);
                        }
                        Some(leader) => {
                            last_err = Some(RpcError::Status(format!(
                                "member {member} reported unknown leader {leader}"
                            )));
                        }
                        None => {
                            last_err = Some(RpcError::Status(format!(
                                "member {member} reports no elected leader"
                            )));
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(member = %member, error = %e, "leader probe failed");
                    last_err = Some(e);
                }
            }
        }

        Err(SdkError::ClusterDown(
            last_err
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no members configured".into()),
        ))
    }
}
