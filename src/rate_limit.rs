use axum::http::HeaderMap;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

// Key used when the request carries no forwarded address
pub const UNKNOWN_CLIENT: &str = "unknown";

// Rate limit entry - tracks attempts per client key
//
// Denied attempts are not counted: `count` stops at the limit until the
// window rolls over.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Time left in the current window, only set on denial.
    pub retry_after: Option<Duration>,
}

impl Decision {
    fn admitted() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn denied(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// Fixed-window limiter keyed by client identifier.
///
/// Built once at startup and kept for the life of the process. Records are
/// never swept, so every key ever seen stays in memory until restart.
///
/// The check-then-increment runs under the DashMap entry guard, which holds
/// the write lock of the key's shard. Concurrent checks for one key are
/// therefore serialized and never admit more than `limit` per window.
#[derive(Debug)]
pub struct Throttle {
    entries: DashMap<String, RateLimitEntry>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl Throttle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self::with_clock(limit, window, Arc::new(SystemClock))
    }

    pub fn with_clock(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
            clock,
        }
    }

    pub fn check_admission(&self, client_key: &str) -> Decision {
        let now = self.clock.now();

        let mut entry = self
            .entries
            .entry(client_key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        // window expired..? start a fresh one
        if now.saturating_duration_since(entry.window_start) > self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.limit {
            let elapsed = now.saturating_duration_since(entry.window_start);
            return Decision::denied(self.window.saturating_sub(elapsed));
        }

        entry.count += 1;
        Decision::admitted()
    }

    /// Number of client keys seen since startup.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    #[cfg(test)]
    fn entry(&self, client_key: &str) -> Option<RateLimitEntry> {
        self.entries.get(client_key).map(|e| *e)
    }
}

// First X-Forwarded-For hop, or the shared "unknown" bucket
//
// Non-ASCII header bytes are decoded lossily so such a client keeps a key
// of its own instead of landing in the shared bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
        .and_then(|v| v.split(',').next().map(|hop| hop.trim().to_string()))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

// Short hash of a client key so addresses stay out of the logs
pub fn client_fingerprint(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
