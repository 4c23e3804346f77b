//! Paginated range scans
//!
//! [`ScanResult`] is a forward-only cursor over `[start_key, end_key)`,
//! buffering one page at a time and refilling from the leader just past
//! the last returned key. It shares the client's inner state by
//! reference count, so a cursor can never outlive the machinery it needs
//! to refill itself.

use std::sync::Arc;

use crate::client::{ClientInner, QuorumClient};
use crate::common::{successor_key, Result, SdkError};
use crate::rpc::KvPair;

pub struct ScanResult {
    inner: Arc<ClientInner>,
    end_key: String,
    buffer: Vec<KvPair>,
    offset: usize,
    exhausted: bool,
    error: Option<SdkError>,
}

impl QuorumClient {
    /// Cursor over every key in `[start_key, end_key)`, ascending.
    pub async fn scan(&self, start_key: &str, end_key: &str) -> ScanResult {
        ScanResult::init(self.inner().clone(), start_key, end_key).await
    }

    /// One-shot bounded scan: a single RPC returning up to one page of
    /// pairs, no pagination. An empty range is an empty `Ok`, not an error.
    pub async fn scan_once(&self, start_key: &str, end_key: &str) -> Result<Vec<KvPair>> {
        let inner = self.inner();
        let gateway = inner.gateway.clone();
        let limit = inner.config.scan_batch_limit;
        let start_key = start_key.to_string();
        let end_key = end_key.to_string();
        let page = inner
            .leader_call("scan", move |leader| {
                let gateway = gateway.clone();
                let start_key = start_key.clone();
                let end_key = end_key.clone();
                async move { gateway.scan(&leader, &start_key, &end_key, limit).await }
            })
            .await?;
        Ok(page.entries)
    }
}

impl ScanResult {
    pub(crate) async fn init(inner: Arc<ClientInner>, start_key: &str, end_key: &str) -> Self {
        let mut result = Self {
            inner,
            end_key: end_key.to_string(),
            buffer: Vec::new(),
            offset: 0,
            exhausted: false,
            error: None,
        };
        result.refill(start_key.to_string()).await;
        result
    }

    /// True once every key in the range has been consumed, or the cursor
    /// hit an error (check [`ScanResult::error`]).
    pub fn done(&self) -> bool {
        self.error.is_some() || self.offset >= self.buffer.len()
    }

    /// Terminal error, if the cursor stopped on one.
    pub fn error(&self) -> Option<&SdkError> {
        self.error.as_ref()
    }

    /// Key at the cursor, `None` when done.
    pub fn key(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.buffer.get(self.offset).map(|pair| pair.key.as_str())
    }

    /// Value at the cursor, `None` when done.
    pub fn value(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        self.buffer.get(self.offset).map(|pair| pair.value.as_str())
    }

    /// Advance the cursor, fetching the next page when the buffered one is
    /// spent and the range may hold more keys.
    pub async fn next(&mut self) {
        if self.error.is_some() {
            return;
        }
        if self.offset < self.buffer.len() {
            self.offset += 1;
        }
        if self.offset >= self.buffer.len() && !self.exhausted {
            let resume_from = match self.buffer.last() {
                Some(last) => successor_key(&last.key),
                None => return,
            };
            self.refill(resume_from).await;
        }
    }

    async fn refill(&mut self, from: String) {
        let gateway = self.inner.gateway.clone();
        let limit = self.inner.config.scan_batch_limit;
        let end_key = self.end_key.clone();
        let fetched = self
            .inner
            .leader_call("scan-page", move |leader| {
                let gateway = gateway.clone();
                let from = from.clone();
                let end_key = end_key.clone();
                async move { gateway.scan(&leader, &from, &end_key, limit).await }
            })
            .await;
        match fetched {
            Ok(page) => {
                self.exhausted = page.entries.is_empty() || !page.has_more;
                self.buffer = page.entries;
                self.offset = 0;
            }
            Err(e) => {
                self.error = Some(e);
                self.buffer.clear();
                self.offset = 0;
                self.exhausted = true;
            }
        }
    }
}
