//! Client SDK facade
//!
//! The client is responsible for:
//! - Leader discovery and failover (cached leader, bounded re-probing)
//! - Session identity and background keepalive
//! - Leader-bound KV operations (Put/Get/Delete/Scan)
//! - The blocking distributed lock and asynchronous watches
//! - Deterministic teardown of all background tasks

mod leader;
mod lock;
mod scan;
mod session;
mod watch;

pub use scan::ScanResult;
pub use session::SessionSnapshot;
pub use watch::{WatchCallback, WatchEvent};

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::common::{Backoff, ClientConfig, Result, RpcError, SdkError};
use crate::rpc::grpc::GrpcGateway;
use crate::rpc::{NodeInfo, RpcGateway};

use leader::LeaderLocator;
use session::SessionState;

/// State shared between the facade, its cursors, and background tasks.
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) gateway: Arc<dyn RpcGateway>,
    pub(crate) locator: LeaderLocator,
    pub(crate) session: SessionState,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientInner {
    pub(crate) fn stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub(crate) fn subscribe_shutdown(&self) -> tokio::sync::watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().unwrap().push(handle);
    }

    /// Run a leader-bound RPC with bounded re-resolution.
    ///
    /// The closure receives the member currently believed to be leader and
    /// reports the raw transport outcome. Retryable failures correct the
    /// leader cache and consume a retry round with backoff; once the budget
    /// is exhausted the last failure shapes the terminal error. Protocol
    /// outcomes the operation cares about (missing key, held lock) must be
    /// folded into the closure's success type.
    pub(crate) async fn leader_call<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = std::result::Result<T, RpcError>>,
    {
        let initial = Duration::from_millis(self.config.retry_backoff_ms);
        let backoff = Backoff::new(initial, initial.saturating_mul(8));
        let mut last_err = RpcError::Unavailable("no attempt made".into());

        for round in 0..self.config.leader_retry_rounds {
            if round > 0 {
                tokio::time::sleep(backoff.delay(round - 1)).await;
            }

            let leader = match self.locator.resolve(self.gateway.as_ref()).await {
                Ok(leader) => leader,
                Err(SdkError::ClusterDown(msg)) => {
                    last_err = RpcError::Unavailable(msg);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match op(leader.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::debug!(op = what, leader = %leader, error = %e, "retrying leader-bound call");
                    self.locator.correct(&leader, &e);
                    last_err = e;
                }
                Err(e) => return Err(SdkError::Internal(format!("{what}: {e}"))),
            }
        }

        tracing::warn!(op = what, error = %last_err, "leader retry budget exhausted");
        Err(SdkError::from_exhausted(last_err))
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Backstop for clients dropped without shutdown(); an aborted task
        // never fires another callback or keepalive.
        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

/// Handle to a quorumkv cluster.
///
/// Cheap to clone; all clones share one session, one leader cache, and one
/// set of background tasks. Call [`QuorumClient::shutdown`] before letting
/// the last clone go out of scope for deterministic teardown.
#[derive(Clone)]
pub struct QuorumClient {
    inner: Arc<ClientInner>,
}

impl QuorumClient {
    /// Connect using the gRPC gateway.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let gateway = Arc::new(GrpcGateway::new(
            config.rpc_timeout(),
            Duration::from_millis(config.watch_poll_timeout_ms),
        ));
        Self::with_gateway(config, gateway)
    }

    /// Construct over an arbitrary gateway implementation.
    ///
    /// Must be called from within a tokio runtime; the keepalive loop is
    /// spawned here.
    pub fn with_gateway(config: ClientConfig, gateway: Arc<dyn RpcGateway>) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);
        let inner = Arc::new(ClientInner {
            locator: LeaderLocator::new(config.members.clone()),
            session: SessionState::new(),
            config,
            gateway,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        });

        let keepalive = tokio::spawn(session::run_keepalive(Arc::downgrade(&inner)));
        inner.track(keepalive);
        tracing::info!(session = %inner.session.id(), "client started");

        Ok(Self { inner })
    }

    /// Session id locks and watches are bound to.
    pub fn session_id(&self) -> String {
        self.inner.session.id()
    }

    /// Current session snapshot, including its rotation epoch.
    pub fn session(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    /// Configured member addresses.
    pub fn members(&self) -> &[String] {
        self.inner.locator.members()
    }

    /// Write a key. Idempotent: re-putting an unchanged value is a no-op
    /// observable only as the same final state.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let gateway = self.inner.gateway.clone();
        let key = key.to_string();
        let value = value.to_string();
        self.inner
            .leader_call("put", move |leader| {
                let gateway = gateway.clone();
                let key = key.clone();
                let value = value.clone();
                async move { gateway.put(&leader, &key, &value).await }
            })
            .await
    }

    /// Read a key from the leader.
    pub async fn get(&self, key: &str) -> Result<String> {
        let gateway = self.inner.gateway.clone();
        let owned = key.to_string();
        let found = self
            .inner
            .leader_call("get", move |leader| {
                let gateway = gateway.clone();
                let key = owned.clone();
                async move {
                    match gateway.get(&leader, &key).await {
                        Ok(value) => Ok(Some(value)),
                        Err(RpcError::NoSuchKey) => Ok(None),
                        Err(e) => Err(e),
                    }
                }
            })
            .await?;
        found.ok_or_else(|| SdkError::NoSuchKey(key.to_string()))
    }

    /// Delete a key.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let gateway = self.inner.gateway.clone();
        let owned = key.to_string();
        let found = self
            .inner
            .leader_call("delete", move |leader| {
                let gateway = gateway.clone();
                let key = owned.clone();
                async move {
                    match gateway.delete(&leader, &key).await {
                        Ok(()) => Ok(true),
                        Err(RpcError::NoSuchKey) => Ok(false),
                        Err(e) => Err(e),
                    }
                }
            })
            .await?;
        if found {
            Ok(())
        } else {
            Err(SdkError::NoSuchKey(key.to_string()))
        }
    }

    /// Snapshot every member's role and log position.
    ///
    /// Any member may answer; the first reachable one wins.
    pub async fn show_cluster(&self) -> Result<Vec<NodeInfo>> {
        let mut last_err: Option<RpcError> = None;
        for member in self.inner.locator.members() {
            match self.inner.gateway.show_cluster(member).await {
                Ok(nodes) => return Ok(nodes),
                Err(e) => {
                    tracing::debug!(member = %member, error = %e, "show_cluster probe failed");
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

    /// Stop all background activity and join it.
    ///
    /// After this returns no keepalive renewal or watch callback will fire
    /// again. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("client stopped");
    }

    pub(crate) fn inner(&self) -> &Arc<ClientInner> {
        &self.inner
    }
}
