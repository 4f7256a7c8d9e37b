use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use shelf_api::SearchMode;
use tokio::time::Instant;
use tracing::debug;

/// Fixed-window quota for a single mode.
///
/// The window opens on the first accepted call and lasts `window`; when it
/// elapses the remaining count snaps back to the full quota.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    quota: u32,
    remaining: u32,
    window: Duration,
    window_start: Option<Instant>,
    generation: u64,
}

impl RateLimitState {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self { quota, remaining: quota, window, window_start: None, generation: 0 }
    }

    pub fn quota(&self) -> u32 {
        self.quota
    }

    fn expired(&self, now: Instant) -> bool {
        self.window_start
            .is_some_and(|start| now.saturating_duration_since(start) >= self.window)
    }

    pub fn remaining_at(&self, now: Instant) -> u32 {
        if self.expired(now) {
            self.quota
        } else {
            self.remaining
        }
    }

    pub fn is_rate_limited_at(&self, now: Instant) -> bool {
        self.remaining_at(now) == 0
    }

    /// Whole seconds (rounded up) until a call is accepted again; 0 when not limited.
    pub fn seconds_until_available_at(&self, now: Instant) -> u64 {
        if !self.is_rate_limited_at(now) {
            return 0;
        }
        match self.window_start {
            Some(start) => {
                let left = (start + self.window).saturating_duration_since(now);
                left.as_secs() + u64::from(left.subsec_nanos() > 0)
            }
            None => self.window.as_secs().max(1),
        }
    }

    fn roll(&mut self, now: Instant) {
        if self.expired(now) {
            self.remaining = self.quota;
            self.window_start = None;
            self.generation += 1;
        }
    }

    /// Take one slot, opening the window if this is its first call.
    /// On exhaustion returns the retry-after in seconds.
    fn reserve(&mut self, now: Instant) -> Result<u64, u64> {
        self.roll(now);
        if self.remaining == 0 {
            return Err(self.seconds_until_available_at(now));
        }
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.remaining -= 1;
        Ok(self.generation)
    }

    /// Give a slot back. Slots from an earlier window are not returned.
    fn refund(&mut self, generation: u64) {
        if generation != self.generation || self.remaining >= self.quota {
            return;
        }
        self.remaining += 1;
        if self.remaining == self.quota {
            self.window_start = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub mode: SearchMode,
    pub quota: u32,
    pub remaining: u32,
    pub is_rate_limited: bool,
    pub seconds_until_available: u64,
}

/// Per-mode quotas behind one lock, so reservations and refunds are serialized.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    states: Mutex<HashMap<SearchMode, RateLimitState>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        let states = SearchMode::ALL
            .into_iter()
            .map(|m| (m, RateLimitState::new(m.per_minute_quota(), window)))
            .collect();
        Self { window, states: Mutex::new(states) }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SearchMode, RateLimitState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<R>(&self, mode: SearchMode, f: impl FnOnce(&mut RateLimitState) -> R) -> R {
        let mut map = self.lock();
        let state = map
            .entry(mode)
            .or_insert_with(|| RateLimitState::new(mode.per_minute_quota(), self.window));
        f(state)
    }

    /// Reserve one call for `mode`. The permit refunds itself on drop unless committed.
    pub fn try_acquire(&self, mode: SearchMode) -> Result<QuotaPermit<'_>, u64> {
        let now = Instant::now();
        let generation = self.with_state(mode, |s| s.reserve(now))?;
        debug!(target: "shelf", %mode, remaining = self.snapshot(mode).remaining, "quota reserved");
        Ok(QuotaPermit { limiter: self, mode, generation, committed: false })
    }

    pub fn snapshot(&self, mode: SearchMode) -> RateLimitSnapshot {
        let now = Instant::now();
        self.with_state(mode, |s| RateLimitSnapshot {
            mode,
            quota: s.quota(),
            remaining: s.remaining_at(now),
            is_rate_limited: s.is_rate_limited_at(now),
            seconds_until_available: s.seconds_until_available_at(now),
        })
    }
}

/// A reserved quota slot.
#[must_use]
pub struct QuotaPermit<'a> {
    limiter: &'a RateLimiter,
    mode: SearchMode,
    generation: u64,
    committed: bool,
}

impl QuotaPermit<'_> {
    /// Keep the slot spent.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for QuotaPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let generation = self.generation;
            self.limiter.with_state(self.mode, |s| s.refund(generation));
        }
    }
}
