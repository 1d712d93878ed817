//! Engine configuration.
//!
//! All settings come from `KADRA_`-prefixed environment variables with
//! sensible defaults, so a bare process starts against a local Redis with
//! the standard TTL and rate limit tables. Per-namespace TTL overrides use
//! the namespace's environment suffix, e.g. `KADRA_TTL_STATS_SECS`.

use kadra_core::Namespace;
use std::collections::HashMap;
use std::time::Duration;

use crate::rate_limit::EndpointClass;

/// Connection settings for the Redis backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`.
    pub url: String,
    /// Upper bound on any single backend round-trip, including the initial
    /// connection.
    pub op_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            op_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Per-namespace entry TTLs.
///
/// Namespaces carry their own defaults; this table only stores explicit
/// overrides on top of them.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
    overrides: HashMap<Namespace, Duration>,
}

impl TtlConfig {
    /// The effective TTL for a namespace.
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        self.overrides
            .get(&namespace)
            .copied()
            .unwrap_or_else(|| namespace.default_ttl())
    }

    /// Override the TTL for one namespace.
    pub fn with_ttl(mut self, namespace: Namespace, ttl: Duration) -> Self {
        self.overrides.insert(namespace, ttl);
        self
    }
}

/// Per-class rate limit thresholds.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    limits: HashMap<EndpointClass, (u32, Duration)>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert(EndpointClass::Login, (100, Duration::from_secs(900)));
        limits.insert(EndpointClass::Mutation, (300, Duration::from_secs(60)));
        limits.insert(EndpointClass::Read, (1_000, Duration::from_secs(60)));
        Self { limits }
    }
}

impl RateLimitConfig {
    /// The `(max_requests, window)` pair for an endpoint class.
    pub fn limit_for(&self, class: EndpointClass) -> (u32, Duration) {
        match self.limits.get(&class) {
            Some(limit) => *limit,
            // Unreachable with the default table, but a missing class must
            // not panic a request path.
            None => (1_000, Duration::from_secs(60)),
        }
    }

    /// Override the threshold for one class.
    pub fn with_limit(mut self, class: EndpointClass, max_requests: u32, window: Duration) -> Self {
        self.limits.insert(class, (max_requests, window));
        self
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub redis: RedisConfig,
    pub ttls: TtlConfig,
    pub rate_limits: RateLimitConfig,
    /// Interval between background health probes.
    pub health_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            ttls: TtlConfig::default(),
            rate_limits: RateLimitConfig::default(),
            health_interval: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let redis = RedisConfig {
            url: std::env::var("KADRA_REDIS_URL")
                .unwrap_or_else(|_| RedisConfig::default().url),
            op_timeout: Duration::from_millis(env_parse(
                "KADRA_REDIS_TIMEOUT_MS",
                RedisConfig::default().op_timeout.as_millis() as u64,
            )),
        };

        let mut ttls = TtlConfig::default();
        for namespace in Namespace::ALL {
            let var = format!("KADRA_TTL_{}_SECS", namespace.env_suffix());
            if let Ok(raw) = std::env::var(&var) {
                match raw.parse::<u64>() {
                    Ok(secs) => {
                        ttls = ttls.with_ttl(namespace, Duration::from_secs(secs));
                    }
                    Err(_) => {
                        tracing::warn!(var = %var, raw = %raw, "invalid TTL override, using default");
                    }
                }
            }
        }

        let rate_limits = RateLimitConfig::default()
            .with_limit(
                EndpointClass::Login,
                env_parse("KADRA_RATE_LOGIN_MAX", 100),
                Duration::from_secs(env_parse("KADRA_RATE_LOGIN_WINDOW_SECS", 900)),
            )
            .with_limit(
                EndpointClass::Mutation,
                env_parse("KADRA_RATE_MUTATION_MAX", 300),
                Duration::from_secs(env_parse("KADRA_RATE_MUTATION_WINDOW_SECS", 60)),
            )
            .with_limit(
                EndpointClass::Read,
                env_parse("KADRA_RATE_READ_MAX", 1_000),
                Duration::from_secs(env_parse("KADRA_RATE_READ_WINDOW_SECS", 60)),
            );

        Self {
            redis,
            ttls,
            rate_limits,
            health_interval: Duration::from_secs(env_parse("KADRA_HEALTH_INTERVAL_SECS", 30)),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    match std::env::var(var) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var, raw = %raw, "invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
