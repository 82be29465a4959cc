//! Sliding-Window Rate Limiter
//!
//! Admission control over a history of admission instants: at most
//! `capacity` admissions in any trailing `window`.

use crate::error::{ApiError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Stand-in admission instant when `window` cannot be added to an instant
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Limits how many requests may start within a sliding time window
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum admissions per window
    capacity: usize,

    /// Length of the sliding window
    window: Duration,

    /// Admission instants, oldest first. Instants in the future belong to
    /// callers that reserved a slot and are still waiting for it; any
    /// `capacity + 1` consecutive entries span at least one window.
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `capacity` requests per `window`
    pub fn new(capacity: usize, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(ApiError::Config(
                "rate limit capacity must be at least 1".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(ApiError::Config(
                "rate limit window must be longer than zero".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            window,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait until one more request fits in the window, then record it.
    ///
    /// Only the calling task is suspended. Dropping the future cancels the
    /// wait, but the reserved slot stays counted.
    pub async fn acquire(&self) {
        let slot = self.reserve(Instant::now());
        let now = Instant::now();
        if slot > now {
            debug!(
                wait_ms = u64::try_from((slot - now).as_millis()).unwrap_or(u64::MAX),
                capacity = self.capacity,
                "rate limit reached, waiting for a free slot"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Admit a request only if that needs no waiting
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut history = self.history.lock();
        Self::evict(&mut history, now, self.window);

        if history.len() >= self.capacity {
            return false;
        }
        history.push_back(now);
        true
    }

    /// Requests that could be admitted right now without waiting
    pub fn available(&self) -> usize {
        let now = Instant::now();
        let mut history = self.history.lock();
        Self::evict(&mut history, now, self.window);
        self.capacity.saturating_sub(history.len())
    }

    /// Record the next admission and return the instant it is granted at
    fn reserve(&self, now: Instant) -> Instant {
        let mut history = self.history.lock();
        Self::evict(&mut history, now, self.window);

        let slot = if history.len() >= self.capacity {
            // The oldest entry that still counts against the new admission
            let blocking = history[history.len() - self.capacity];
            blocking
                .checked_add(self.window)
                .unwrap_or_else(|| now + FAR_FUTURE)
                .max(now)
        } else {
            now
        };

        history.push_back(slot);
        slot
    }

    /// Drop admissions that are a full window old as of `at`
    fn evict(history: &mut VecDeque<Instant>, at: Instant, window: Duration) {
        while let Some(&oldest) = history.front() {
            // A window too long to add to an instant never expires
            match oldest.checked_add(window) {
                Some(expiry) if expiry <= at => {
                    history.pop_front();
                }
                _ => break,
            }
        }
    }

    #[cfg(test)]
    fn recorded(&self) -> Vec<Instant> {
        self.history.lock().iter().copied().collect()
    }
}
