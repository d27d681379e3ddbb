//! Sliding-window request limiter keyed by client identity
//!
//! Each client owns a log of admission timestamps. On every check the log is
//! pruned to the trailing window; the request is admitted only while fewer
//! than `limit` timestamps remain. State is in-memory and per process.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default number of requests admitted per client per window
pub const LIMIT_PER_MINUTE: usize = 10;

/// Length of the sliding window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Returned when a client has exhausted its window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limit exceeded. Try again later.")]
pub struct RateLimited {
    /// Time until the oldest admission leaves the window
    pub retry_after: Duration,
}

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    windows: Mutex<Windows>,
}

#[derive(Default)]
struct Windows {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Windows {
    /// Forget clients with nothing left in the window. Runs at most once per
    /// window so the map stays bounded by recently active clients.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .last_sweep
            .is_some_and(|last| now.saturating_duration_since(last) < window)
        {
            return;
        }
        let before = self.clients.len();
        self.clients.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window)
        });
        self.last_sweep = Some(now);
        if self.clients.len() < before {
            tracing::debug!(
                removed = before - self.clients.len(),
                remaining = self.clients.len(),
                "Pruned idle rate limit windows"
            );
        }
    }
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Admit or reject a request from `client` at the current instant
    pub fn admit(&self, client: &str) -> Result<(), RateLimited> {
        self.admit_at(client, Instant::now())
    }

    /// Admit or reject a request from `client` at `now`
    pub fn admit_at(&self, client: &str, now: Instant) -> Result<(), RateLimited> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.sweep(now, self.window);
        let timestamps = windows.clients.entry(client.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            timestamps.pop_front();
        }

        if timestamps.len() >= self.limit {
            let retry_after = timestamps.front().map_or(self.window, |&oldest| {
                self.window
                    .saturating_sub(now.saturating_duration_since(oldest))
            });
            tracing::warn!(
                client = %client,
                limit = self.limit,
                retry_after_ms = %retry_after.as_millis(),
                "Rate limit exceeded"
            );
            return Err(RateLimited { retry_after });
        }

        timestamps.push_back(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clients
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(LIMIT_PER_MINUTE, WINDOW)
    }
}
