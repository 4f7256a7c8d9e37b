//! Dual-mode search dispatch.
//!
//! A search goes through, in order: query normalisation, the per-mode quota,
//! one backend call, envelope decoding, and finally the store sink. The first
//! two steps never touch the network.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shelf_api::{decode_envelope, DecodeError, Envelope, SearchErrorEnvelope, SearchMode};
use shelf_api::{SearchRequest, SearchResponseEnvelope};
use shelf_query::{normalize_query, QueryError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, SearchBackend};
use crate::ratelimit::{RateLimitSnapshot, RateLimiter};
use crate::store::{BookStore, StoreError};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    #[error("rate limited; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("search rejected: {} ({})", .0.message, .0.code)]
    Rejected(SearchErrorEnvelope),
    #[error("store failure: {0}")]
    Store(String),
}

impl From<BackendError> for SearchError {
    fn from(e: BackendError) -> Self {
        match e {
            // an oversized reply is a bad body, wherever it is caught
            BackendError::TooLarge(limit) => SearchError::MalformedResponse(limit.to_string()),
            other => SearchError::TransportFailure(other.to_string()),
        }
    }
}

impl From<DecodeError> for SearchError {
    fn from(e: DecodeError) -> Self {
        SearchError::MalformedResponse(e.to_string())
    }
}

impl From<StoreError> for SearchError {
    fn from(e: StoreError) -> Self {
        SearchError::Store(e.to_string())
    }
}

pub struct SearchDispatcher {
    backend: Arc<dyn SearchBackend>,
    store: Arc<dyn BookStore>,
    limits: RateLimiter,
    window: Duration,
    active: Mutex<SearchMode>,
    forwarded: Mutex<HashSet<String>>,
}

impl SearchDispatcher {
    /// All quotas start full; the active mode starts as `Text`.
    pub fn new(backend: Arc<dyn SearchBackend>, store: Arc<dyn BookStore>, window: Duration) -> Self {
        Self {
            backend,
            store,
            limits: RateLimiter::new(window),
            window,
            active: Mutex::new(SearchMode::Text),
            forwarded: Mutex::new(HashSet::new()),
        }
    }

    pub fn configure(&self, mode: SearchMode) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    pub fn active_mode(&self) -> SearchMode {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Search with the mode last passed to `configure`.
    pub async fn search_active(&self, query: &str) -> Result<SearchResponseEnvelope, SearchError> {
        self.search(query, self.active_mode()).await
    }

    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<SearchResponseEnvelope, SearchError> {
        let query = normalize_query(query).inspect_err(|e| {
            debug!(target: "shelf", %mode, "rejected before dispatch: {e}");
        })?;

        let permit = self.limits.try_acquire(mode).map_err(|retry_after_secs| {
            info!(target: "shelf", %mode, retry_after_secs, "quota exhausted");
            SearchError::RateLimited { retry_after_secs }
        })?;

        debug!(target: "shelf", %mode, terms = query.term_count(), "dispatching search");
        let request = SearchRequest::new(query.into_string(), mode);
        let reply = self.backend.execute(&request).await.inspect_err(|e| {
            warn!(target: "shelf", %mode, "backend call failed: {e}");
        })?;

        if reply.is_throttled() {
            let retry_after_secs = reply.retry_after.unwrap_or(self.window).as_secs().max(1);
            info!(target: "shelf", %mode, retry_after_secs, "backend throttled");
            return Err(SearchError::RateLimited { retry_after_secs });
        }

        let envelope = match decode_envelope(&reply.body)? {
            Envelope::Results(env) => env,
            Envelope::Error(err) => {
                info!(target: "shelf", %mode, code = %err.code, "backend returned error envelope");
                return Err(SearchError::Rejected(err));
            }
        };
        if envelope.mode != mode {
            return Err(SearchError::MalformedResponse(format!(
                "requested {mode} search but response is for {}",
                envelope.mode
            )));
        }

        // Each id reaches the store once per dispatcher. A failed write
        // releases its claim and the permit refunds on the early return.
        for result in &envelope.results {
            if !self.claim(&result.id) {
                continue;
            }
            if let Err(e) = self.store.upsert(result).await {
                self.release(&result.id);
                warn!(target: "shelf", %mode, id = %result.id, "store write failed: {e}");
                return Err(e.into());
            }
        }
        permit.commit();
        debug!(
            target: "shelf",
            %mode,
            results = envelope.results.len(),
            total = envelope.total,
            latency_ms = envelope.latency_ms,
            "search complete"
        );
        Ok(envelope)
    }

    fn claim(&self, id: &str) -> bool {
        let mut forwarded = self.forwarded.lock().unwrap_or_else(PoisonError::into_inner);
        if forwarded.contains(id) {
            false
        } else {
            forwarded.insert(id.to_string())
        }
    }

    fn release(&self, id: &str) {
        self.forwarded.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    }

    pub fn rate_limit(&self, mode: SearchMode) -> RateLimitSnapshot {
        self.limits.snapshot(mode)
    }

    pub fn remaining_semantic_searches(&self) -> u32 {
        self.rate_limit(SearchMode::Semantic).remaining
    }

    pub fn is_semantic_search_rate_limited(&self) -> bool {
        self.rate_limit(SearchMode::Semantic).is_rate_limited
    }

    pub fn seconds_until_semantic_search_available(&self) -> u64 {
        self.rate_limit(SearchMode::Semantic).seconds_until_available
    }
}
