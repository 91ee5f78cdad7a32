//! Per-client fixed-window rate limiting.
//!
//! Each client key owns a `RateWindow` that counts requests until its
//! `reset_at` passes, at which point the next request opens a fresh window.
//! State is in-process and lost on restart. Handlers only see the
//! `RateLimitStore` trait so the in-memory map can be swapped for a shared
//! store without touching them.
//!
//! A background sweeper drops windows that have expired, which bounds memory
//! to the number of recently active clients. It is housekeeping only: the
//! expiry check in `admit` already ignores stale windows.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Client key used when neither a forwarded header nor a peer address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Source of the current time. Injected so window expiry can be tested
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Request count for one client within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The client has used up its window; it may retry after `reset_at`.
    Denied { reset_at: DateTime<Utc> },
}

/// Storage backend for rate windows.
///
/// `admit` must be atomic per key: concurrent calls for the same key may not
/// lose increments or admit more than the limit.
pub trait RateLimitStore: Send + Sync {
    /// Count a request from `key` and decide whether it may proceed.
    fn admit(&self, key: &str) -> Admission;

    /// Remove windows whose `reset_at` has passed. Returns how many were removed.
    fn sweep(&self) -> usize;

    /// Number of tracked client keys.
    fn tracked_keys(&self) -> usize;
}

/// Process-local rate limiter guarded by a single mutex.
///
/// The lock is only held for the synchronous check-and-update, never across
/// an await point.
pub struct InMemoryRateLimiter<C: Clock = SystemClock> {
    windows: Mutex<HashMap<String, RateWindow>>,
    limit: u32,
    window: Duration,
    clock: C,
}

impl InMemoryRateLimiter<SystemClock> {
    pub fn new(limit: u32, window: std::time::Duration) -> Self {
        Self::with_clock(limit, window, SystemClock)
    }
}

impl<C: Clock> InMemoryRateLimiter<C> {
    pub fn with_clock(limit: u32, window: std::time::Duration, clock: C) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            window: Duration::from_std(window).unwrap_or(Duration::hours(1)),
            clock,
        }
    }

    #[cfg(test)]
    pub(crate) fn window_for(&self, key: &str) -> Option<RateWindow> {
        self.windows.lock().get(key).copied()
    }
}

impl<C: Clock> RateLimitStore for InMemoryRateLimiter<C> {
    fn admit(&self, key: &str) -> Admission {
        let now = self.clock.now();
        let mut windows = self.windows.lock();

        match windows.get_mut(key) {
            Some(w) if now <= w.reset_at => {
                if w.count >= self.limit {
                    return Admission::Denied {
                        reset_at: w.reset_at,
                    };
                }
                w.count += 1;
                Admission::Allowed
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                Admission::Allowed
            }
        }
    }

    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| w.reset_at >= now);
        before - windows.len()
    }

    fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Spawn the background task that sweeps expired windows every `every`.
pub fn spawn_sweeper(store: Arc<dyn RateLimitStore>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep();
            tracing::debug!(
                removed,
                remaining = store.tracked_keys(),
                "Swept expired rate limit windows"
            );
        }
    })
}

/// Identify the caller for rate limiting.
///
/// Prefers the first `X-Forwarded-For` entry when `trust_forwarded_for` is
/// set, then the transport peer address, then `UNKNOWN_CLIENT`. The header is
/// client-controlled, so it is only honoured behind a trusted proxy.
pub fn resolve_client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
