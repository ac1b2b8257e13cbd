//! Per-client token bucket rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::middleware::request_log::client_host;
use crate::observability::LogRecord;
use crate::AppState;

/// Above this many tracked clients, idle buckets are evicted.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Buckets untouched for this long are full again and safe to forget.
const IDLE_EVICTION: Duration = Duration::from_secs(120);

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Limits each client to `per_minute` requests, with a burst of the same size.
///
/// A limit of zero disables limiting.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity: f64::from(limit),
            refill_per_sec: f64::from(limit) / 60.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0.0
    }

    /// Take one token for `client`. Returns false when the client is over its limit.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(client) {
            buckets.retain(|_, b| now.saturating_duration_since(b.last_update) < IDLE_EVICTION);

            // Every tracked client is active: make room by dropping the stalest one.
            if buckets.len() >= MAX_TRACKED_CLIENTS {
                let stalest = buckets
                    .iter()
                    .min_by_key(|(_, b)| b.last_update)
                    .map(|(key, _)| key.clone());
                if let Some(key) = stalest {
                    buckets.remove(&key);
                }
            }
        }

        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(self.capacity, self.refill_per_sec, now)
    }
}

/// Middleware rejecting clients over `RATE_LIMIT_PER_MINUTE` with 429.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_host(request.extensions()).unwrap_or_else(|| "unknown".to_string());

    if state.limiter.check(&client) {
        return next.run(request).await;
    }

    state.logger.emit(
        LogRecord::warning("rate_limited")
            .message("Rate limit exceeded")
            .field("client_host", client.as_str())
            .field("path", request.uri().path()),
    );
    AppError::RateLimited.into_response()
}
