//! Fixed-window request rate limiting.
//!
//! One backend counter per `(identity, endpoint)` pair, driven entirely by
//! the store's atomic increment-with-TTL-on-create primitive. Windows are
//! fixed, not sliding: bursts are possible at window boundaries, which is an
//! accepted characteristic of the design rather than a defect.
//!
//! A backend failure fails open: the request is allowed and the incident is
//! logged. Rate limiting protects capacity; it must never become the thing
//! that takes the service down.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::store::CacheStore;

/// Coarse endpoint classes with independently configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    /// Authentication attempts: tight limits, long windows.
    Login,
    /// Mutating endpoints.
    Mutation,
    /// Read-only endpoints.
    Read,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Login => "login",
            EndpointClass::Mutation => "mutation",
            EndpointClass::Read => "read",
        }
    }
}

/// The outcome of a rate limit check.
///
/// `allowed = false` is a throttling signal, not an error: it is the only
/// condition in this subsystem surfaced to the end user as a rejected
/// request, carrying retry-after information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: u32,
    /// How long until the window resets. Only set on rejection.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: None,
        }
    }

    fn rejected(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }
}

/// Fixed-window rate limiter over an injected [`CacheStore`].
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Check whether `identity` may issue another request to `endpoint`.
    ///
    /// The counter is created with `window` as its TTL on the first request
    /// of a window; the TTL is never extended afterwards, so the window
    /// closes at a fixed time regardless of traffic.
    pub async fn allow(
        &self,
        identity: &str,
        endpoint: &str,
        max_requests: u32,
        window: Duration,
    ) -> RateLimitDecision {
        let key = counter_key(identity, endpoint);

        let count = match self.store.increment(&key, window).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(identity, endpoint, error = %e, "rate limit check failed, failing open");
                return RateLimitDecision::allowed(max_requests);
            }
        };

        if count <= max_requests as i64 {
            let remaining = max_requests.saturating_sub(count as u32);
            return RateLimitDecision::allowed(remaining);
        }

        let retry_after = match self.store.ttl_remaining(&key).await {
            Ok(Some(remaining)) => remaining.min(window),
            Ok(None) => window,
            Err(e) => {
                tracing::warn!(identity, endpoint, error = %e, "retry-after lookup failed");
                window
            }
        };

        tracing::debug!(identity, endpoint, count, "rate limit exceeded");
        RateLimitDecision::rejected(retry_after)
    }

    /// Check against the configured thresholds for an endpoint class.
    pub async fn allow_class(&self, identity: &str, class: EndpointClass) -> RateLimitDecision {
        let (max_requests, window) = self.config.limit_for(class);
        self.allow(identity, class.as_str(), max_requests, window)
            .await
    }
}

fn counter_key(identity: &str, endpoint: &str) -> String {
    format!("ratelimit:{}:{}", identity, endpoint)
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}
