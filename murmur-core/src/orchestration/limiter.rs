use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

/// Key used when no client identity is available.
pub const GLOBAL_CLIENT_KEY: &str = "global";

/// Quota state exposed to clients so they can back off correctly
/// (`X-RateLimit-*` headers at the HTTP layer).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub reset_secs: u64,
}

/// Request denied: the client exhausted its quota for this window.
#[derive(Debug, Clone, Error)]
#[error("rate limit exceeded ({limit} requests per {window_secs}s)", limit = .info.limit)]
pub struct RateLimitExceeded {
    pub info: RateLimitInfo,
    pub window_secs: u64,
    /// Seconds until a request will be admitted again.
    pub retry_after_secs: u64,
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client identity.
///
/// The window resets `window` after it was opened, not after the last
/// request, so a steady trickle cannot starve a client forever. This
/// bounds request ingress only; task concurrency is the scheduler's
/// concern.
pub struct RateLimiter {
    quota: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request from `client`. Admission consumes
    /// one unit of quota.
    pub fn check(&self, client: &str) -> Result<RateLimitInfo, RateLimitExceeded> {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Drop idle clients once the map grows, so a churn of one-shot
        // clients cannot grow it without bound.
        if windows.len() >= 1024 {
            let stale = self.window * 2;
            windows.retain(|_, w| now.duration_since(w.started) < stale);
        }

        let window = windows.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.window {
            // Full reset, computed from the window start.
            window.started = now;
            window.count = 0;
        }

        let reset_secs = (self.window - now.duration_since(window.started)).as_secs();
        if window.count < self.quota {
            window.count += 1;
            Ok(RateLimitInfo {
                limit: self.quota,
                remaining: self.quota - window.count,
                reset_secs,
            })
        } else {
            Err(RateLimitExceeded {
                info: RateLimitInfo {
                    limit: self.quota,
                    remaining: 0,
                    reset_secs,
                },
                window_secs: self.window.as_secs(),
                retry_after_secs: reset_secs.max(1),
            })
        }
    }
}
