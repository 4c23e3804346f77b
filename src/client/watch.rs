//! Watch coordinator
//!
//! Each watch owns a background task that long-polls the leader for the
//! watched key, carrying the last observed (value, presence) baseline.
//! The server answers with the current state once it differs, so every
//! delivery is a real transition relative to what the callback last saw:
//! deliveries chain (each `old_value` equals the previous `new_value`),
//! never duplicate, and never fire for an unchanged value.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::client::{ClientInner, QuorumClient};
use crate::common::{Backoff, Result, RpcError, SdkError};
use crate::rpc::WatchPoll;

/// One observed transition of a watched key.
///
/// `None` values mean the key was absent on that side of the transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// User callback, invoked from the watch's background task.
///
/// Receives `Ok(event)` at most once per observed transition, in order,
/// and `Err(..)` exactly once if the watch dies on an unrecoverable
/// error; nothing is delivered after client shutdown.
pub type WatchCallback = Box<dyn Fn(Result<WatchEvent>) + Send + Sync>;

enum Step {
    /// Initial read completed; the watch has its baseline.
    Baseline(Option<String>),
    /// Long-poll round reported a new state.
    Changed(Option<String>),
    /// Long-poll round lapsed without change.
    Unchanged,
}

impl QuorumClient {
    /// Register a watch on `key`.
    ///
    /// Returns immediately; `callback` fires asynchronously on a dedicated
    /// background task until the client shuts down or the watch hits an
    /// unrecoverable error (reported to the callback exactly once).
    pub fn watch(&self, key: &str, callback: WatchCallback) -> Result<()> {
        let inner = self.inner().clone();
        if inner.stopped() {
            return Err(SdkError::Internal("client is shut down".into()));
        }
        let key = key.to_string();
        tracing::debug!(key, "watch registered");
        let handle = tokio::spawn(run_watch(Arc::downgrade(&inner), key, callback));
        inner.track(handle);
        Ok(())
    }
}

pub(crate) async fn run_watch(client: Weak<ClientInner>, key: String, callback: WatchCallback) {
    let (mut shutdown, threshold, backoff) = match client.upgrade() {
        Some(inner) => {
            let initial = Duration::from_millis(inner.config.retry_backoff_ms);
            (
                inner.subscribe_shutdown(),
                inner.config.watch_failure_threshold.max(1),
                Backoff::new(initial, initial.saturating_mul(8)),
            )
        }
        None => return,
    };

    // None until INIT establishes the first (value, presence) baseline.
    let mut baseline: Option<Option<String>> = None;
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return;
        }
        let Some(inner) = client.upgrade() else {
            return;
        };

        let outcome = tokio::select! {
            _ = shutdown.changed() => return,
            result = step(&inner, &key, &baseline) => result,
        };
        drop(inner);

        match outcome {
            Ok(Step::Baseline(value)) => {
                tracing::debug!(key, has_key = value.is_some(), "watch baseline established");
                baseline = Some(value);
                failures = 0;
            }
            Ok(Step::Changed(new_value)) => {
                let old_value = baseline.clone().unwrap_or(None);
                // an echo of the baseline is not a transition
                if old_value != new_value {
                    tracing::debug!(key, "watch transition delivered");
                    callback(Ok(WatchEvent {
                        key: key.clone(),
                        old_value,
                        new_value: new_value.clone(),
                    }));
                }
                baseline = Some(new_value);
                failures = 0;
            }
            Ok(Step::Unchanged) => {
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(key, error = %e, failures, "watch poll failed");
                if failures >= threshold {
                    callback(Err(e));
                    return;
                }
                tokio::select! {
                    _ = tokio::time::sleep(backoff.delay(failures - 1)) => {}
                    _ = shutdown.changed() => return,
                }
            }
        }
    }
}

/// One round of the watch state machine: INIT reads the current value,
/// POLLING long-polls for a change past the baseline.
async fn step(
    inner: &Arc<ClientInner>,
    key: &str,
    baseline: &Option<Option<String>>,
) -> Result<Step> {
    match baseline {
        None => {
            let gateway = inner.gateway.clone();
            let key = key.to_string();
            let value = inner
                .leader_call("watch-init", move |leader| {
                    let gateway = gateway.clone();
                    let key = key.clone();
                    async move {
                        match gateway.get(&leader, &key).await {
                            Ok(value) => Ok(Some(value)),
                            Err(RpcError::NoSuchKey) => Ok(None),
                            Err(e) => Err(e),
                        }
                    }
                })
                .await?;
            Ok(Step::Baseline(value))
        }
        Some(last) => {
            let gateway = inner.gateway.clone();
            let session = inner.clone();
            let key = key.to_string();
            let last = last.clone();
            let poll = inner
                .leader_call("watch-poll", move |leader| {
                    let gateway = gateway.clone();
                    let key = key.clone();
                    let last = last.clone();
                    let session_id = session.session.id();
                    async move {
                        match gateway.watch(&leader, &key, &session_id, last.as_deref()).await {
                            Ok(poll) => Ok(poll),
                            // heals once the keepalive loop rotates the session
                            Err(RpcError::SessionExpired) => {
                                Err(RpcError::Unavailable("session expired, awaiting rotation".into()))
                            }
                            Err(e) => Err(e),
                        }
                    }
                })
                .await?;
            Ok(match poll {
                WatchPoll::Changed { value } => Step::Changed(value),
                WatchPoll::Unchanged => Step::Unchanged,
            })
        }
    }
}
