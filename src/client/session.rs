//! Session identity and the keepalive loop
//!
//! One session per client instance. Locks and watches are tagged with the
//! session id so the cluster can release them if the session expires. The
//! keepalive loop renews the session against the current leader; once
//! failures cross the configured threshold the session is rotated and
//! everything bound to the old id is treated as lost.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use uuid::Uuid;

use crate::client::ClientInner;
use crate::common::{timestamp_now_millis, RpcError};

/// Immutable view of the session at one point in time.
///
/// `epoch` increments on every rotation; a waiter that captured epoch N
/// and later observes a different epoch knows its session-bound state is
/// gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub epoch: u64,
}

pub(crate) struct SessionState {
    tx: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot {
            id: mint_session_id(),
            epoch: 0,
        });
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn id(&self) -> String {
        self.tx.borrow().id.clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Declare the current session dead and mint a replacement.
    ///
    /// Waiters blocked on the old session observe the epoch change; locks
    /// held under the old id are released server-side when it expires.
    pub(crate) fn rotate(&self) -> SessionSnapshot {
        let mut fresh = None;
        self.tx.send_modify(|s| {
            s.id = mint_session_id();
            s.epoch += 1;
            fresh = Some(s.clone());
        });
        let fresh = fresh.expect("send_modify ran");
        tracing::warn!(session = %fresh.id, epoch = fresh.epoch, "session rotated");
        fresh
    }
}

/// Session ids mix wall-clock and random entropy so two client instances
/// on one host never collide.
fn mint_session_id() -> String {
    format!("{}-{}", timestamp_now_millis(), Uuid::new_v4().simple())
}

/// Background keepalive loop, one per client instance.
///
/// Each cycle resolves the leader, renews the session, then sleeps the
/// configured interval. Runs until the client's stop signal fires. Holds
/// the client state only weakly so an abandoned client winds down instead
/// of being pinned alive by its own loop.
pub(crate) async fn run_keepalive(client: Weak<ClientInner>) {
    let (mut shutdown, interval, threshold) = match client.upgrade() {
        Some(inner) => (
            inner.subscribe_shutdown(),
            inner.config.keepalive_interval(),
            inner.config.keepalive_failure_threshold.max(1),
        ),
        None => return,
    };
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return;
        }
        let Some(inner) = client.upgrade() else {
            return;
        };

        match keepalive_once(&inner).await {
            Ok(()) => {
                if failures > 0 {
                    tracing::debug!("keepalive recovered after {failures} failures");
                }
                failures = 0;
            }
            Err(RpcError::SessionExpired) => {
                // Server-side expiry is ground truth; rotate immediately.
                inner.session.rotate();
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(error = %e, failures, "keepalive failed");
                if failures >= threshold {
                    inner.session.rotate();
                    failures = 0;
                }
            }
        }
        drop(inner);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => return,
        }
    }
}

/// One renewal attempt: resolve the leader, send KeepAlive.
async fn keepalive_once(inner: &Arc<ClientInner>) -> Result<(), RpcError> {
    let leader = inner
        .locator
        .resolve(inner.gateway.as_ref())
        .await
        .map_err(|e| RpcError::Unavailable(e.to_string()))?;
    let session_id = inner.session.id();
    match inner.gateway.keep_alive(&leader, &session_id).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if e.is_retryable() {
                inner.locator.correct(&leader, &e);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_unique() {
        let a = mint_session_id();
        let b = mint_session_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn test_rotate_bumps_epoch_and_id() {
        let state = SessionState::new();
        let before = state.snapshot();
        assert_eq!(before.epoch, 0);

        let after = state.rotate();
        assert_eq!(after.epoch, 1);
        assert_ne!(after.id, before.id);
        assert_eq!(state.snapshot(), after);
    }

    #[tokio::test]
    async fn test_subscribers_observe_rotation() {
        let state = SessionState::new();
        let mut rx = state.subscribe();
        let first_epoch = rx.borrow().epoch;

        state.rotate();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().epoch, first_epoch + 1);
    }
}
