// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client-side sliding-window rate limiting.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::ConfigError;

/// Requests allowed per window by the Transistor API
pub const DEFAULT_MAX_REQUESTS: usize = 10;

/// Length of the Transistor API rate window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Allows at most `max_requests` calls in any trailing `window`.
///
/// Callers that would exceed the quota are suspended until the oldest
/// recorded request leaves the window. The limiter never rejects a call.
/// Share one instance through an `Arc` to apply a single quota to several
/// clients; `acquire` holds an internal lock across check-and-record.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        if window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }

        Ok(Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        })
    }

    /// The documented Transistor quota of 10 requests per 10 seconds
    pub fn transistor_default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
            timestamps: Mutex::new(VecDeque::with_capacity(DEFAULT_MAX_REQUESTS)),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a free slot in the window and claim it.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let mut timestamps = self.timestamps.lock().await;
        let started = Instant::now();

        loop {
            let now = Instant::now();
            self.prune(&mut timestamps, now);

            if timestamps.len() < self.max_requests {
                timestamps.push_back(now);
                let waited = now.duration_since(started);
                if !waited.is_zero() {
                    debug!(waited_ms = waited.as_millis() as u64, "rate limit slot acquired");
                }
                return waited;
            }

            // Window is full, so the front entry exists
            let Some(&oldest) = timestamps.front() else {
                continue;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            info!(
                wait_ms = wait.as_millis() as u64,
                max_requests = self.max_requests,
                window_secs = self.window.as_secs_f64(),
                "rate limit window full, waiting"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of requests recorded in the trailing window
    pub async fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while timestamps
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            timestamps.pop_front();
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::transistor_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn rejects_zero_requests() {
        assert!(matches!(
            RateLimiter::new(0, Duration::from_secs(10)),
            Err(ConfigError::ZeroRequests)
        ));
    }

    #[test]
    fn rejects_zero_window() {
        assert!(matches!(
            RateLimiter::new(10, Duration::ZERO),
            Err(ConfigError::ZeroWindow)
        ));
    }

    #[test]
    fn default_matches_provider_quota() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.max_requests(), 10);
        assert_eq!(limiter.window(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn first_n_calls_do_not_wait() {
        let limiter = RateLimiter::new(5, Duration::from_secs(1)).unwrap();
        let start = Instant::now();

        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.in_window().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_five_calls_at_ten_per_ten_seconds() {
        let limiter = RateLimiter::new(10, Duration::from_secs(10)).unwrap();
        let start = Instant::now();
        let mut issued = Vec::new();

        for call in 0..25 {
            let waited = limiter.acquire().await;
            if call < 10 {
                assert_eq!(waited, Duration::ZERO, "call {} should be immediate", call + 1);
            }
            issued.push(start.elapsed());
        }

        // Two forced waits: calls 11-20 at t=10s, calls 21-25 at t=20s
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(issued[10], Duration::from_secs(10));
        assert_eq!(issued[20], Duration::from_secs(20));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn no_trailing_window_exceeds_quota() {
        for (max, secs) in [(1usize, 1u64), (3, 2), (10, 10)] {
            let window = Duration::from_secs(secs);
            let limiter = RateLimiter::new(max, window).unwrap();
            let start = Instant::now();
            let mut issued = Vec::new();

            for _ in 0..(2 * max) {
                limiter.acquire().await;
                issued.push(start.elapsed());
            }

            assert!(issued[..max].iter().all(|t| t.is_zero()));
            assert!(issued[max..].iter().all(|t| *t >= window));
            for (i, t) in issued.iter().enumerate() {
                let in_window = issued[..=i]
                    .iter()
                    .filter(|earlier| *t - **earlier < window)
                    .count();
                assert!(in_window <= max, "window ending at {:?} holds {}", t, in_window);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slots_free_up_as_window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10)).unwrap();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.acquire().await;

        // Oldest request leaves the window 6s later, not a full window later
        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_limiter_serializes_concurrent_callers() {
        let limiter = Arc::new(RateLimiter::new(3, Duration::from_secs(5)).unwrap());
        let start = Instant::now();

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap());
        }
        issued.sort();

        assert_eq!(issued.iter().filter(|t| t.is_zero()).count(), 3);
        assert_eq!(issued[8], Duration::from_secs(10));
    }
}
