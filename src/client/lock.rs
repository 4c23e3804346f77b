//! Distributed lock coordinator
//!
//! A lock is a conditional create-if-absent of the lock key, tagged with
//! the client's session id. The cluster releases it when the session
//! expires, so a crashed holder cannot wedge its waiters. While the key is
//! held elsewhere the waiter backs off with jitter and re-attempts; it
//! aborts with a lock failure the moment its own session rotates.

use std::time::Duration;

use crate::client::QuorumClient;
use crate::common::{Backoff, Result, RpcError, SdkError};

/// Outcome of one conditional-write attempt.
enum Attempt {
    Acquired,
    Held,
    Expired,
}

impl QuorumClient {
    /// Acquire the lock on `key`, blocking until it is free.
    ///
    /// May suspend for an unbounded time while another session holds the
    /// key. Fails with [`SdkError::LockFail`] if this client's session is
    /// invalidated while waiting or the client shuts down, and with
    /// [`SdkError::ClusterDown`]/[`SdkError::Timeout`] when the cluster
    /// stays unreachable past the retry budget.
    pub async fn lock(&self, key: &str) -> Result<()> {
        let inner = self.inner();
        let started_under = inner.session.snapshot();
        let mut session_rx = inner.session.subscribe();
        let mut shutdown = inner.subscribe_shutdown();
        let backoff = Backoff::new(
            Duration::from_millis(inner.config.lock_backoff_ms),
            Duration::from_millis(inner.config.lock_backoff_cap_ms),
        );
        let mut waits: u32 = 0;

        loop {
            if inner.stopped() {
                return Err(SdkError::LockFail("client is shut down".into()));
            }
            if inner.session.snapshot().epoch != started_under.epoch {
                return Err(SdkError::LockFail("session lost while waiting".into()));
            }

            match self.lock_attempt(key).await? {
                Attempt::Acquired => {
                    tracing::info!(key, session = %started_under.id, "lock acquired");
                    return Ok(());
                }
                Attempt::Expired => {
                    return Err(SdkError::LockFail("session expired at the leader".into()));
                }
                Attempt::Held => {
                    tracing::debug!(key, waits, "lock held by another session, waiting");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff.delay(waits)) => {}
                        _ = session_rx.changed() => {}
                        _ = shutdown.changed() => {}
                    }
                    waits = waits.saturating_add(1);
                }
            }
        }
    }

    /// Single conditional-write attempt; `Ok(false)` means the key is held
    /// by another session.
    pub async fn try_lock(&self, key: &str) -> Result<bool> {
        match self.lock_attempt(key).await? {
            Attempt::Acquired => Ok(true),
            Attempt::Held => Ok(false),
            Attempt::Expired => Err(SdkError::LockFail("session expired at the leader".into())),
        }
    }

    async fn lock_attempt(&self, key: &str) -> Result<Attempt> {
        let inner = self.inner();
        let gateway = inner.gateway.clone();
        let key = key.to_string();
        let session = inner.clone();
        inner
            .leader_call("lock", move |leader| {
                let gateway = gateway.clone();
                let key = key.clone();
                let session_id = session.session.id();
                async move {
                    match gateway.lock(&leader, &key, &session_id).await {
                        Ok(()) => Ok(Attempt::Acquired),
                        Err(RpcError::LockHeld) => Ok(Attempt::Held),
                        Err(RpcError::SessionExpired) => Ok(Attempt::Expired),
                        Err(e) => Err(e),
                    }
                }
            })
            .await
    }
}
