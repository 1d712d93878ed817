//! Caching, invalidation, and rate limiting engine for the Kadra workforce
//! platform.
//!
//! The engine sits between the API layer and a Redis-compatible backend and
//! provides four coordinated services over one [`store::CacheStore`]:
//!
//! - [`query::QueryCache`]: get-or-compute caching of expensive read
//!   queries, keyed by canonicalized parameter structs.
//! - [`invalidation::InvalidationCoordinator`]: tag-driven pattern deletion
//!   after mutating operations.
//! - [`rate_limit::RateLimiter`]: fixed-window request throttling.
//! - [`health::HealthMonitor`]: backend connectivity and usage reporting.
//!
//! Everything fails open. A dead backend degrades the system to uncached
//! pass-through behavior; the only caller-visible rejection this crate ever
//! produces is a rate limit decision.

pub mod config;
pub mod engine;
pub mod health;
pub mod invalidation;
pub mod key;
pub mod query;
pub mod rate_limit;
pub mod store;

pub use config::{EngineConfig, RateLimitConfig, RedisConfig, TtlConfig};
pub use engine::CacheEngine;
pub use health::{HealthMonitor, HealthMonitorHandle, HealthReport};
pub use invalidation::{InvalidationCoordinator, InvalidationOutcome};
pub use key::CacheKey;
pub use query::{QueryCache, QueryOptions};
pub use rate_limit::{EndpointClass, RateLimitDecision, RateLimiter};
pub use store::{CacheStats, CacheStore, MemoryStore, RedisStore};

pub use kadra_core::{CacheParams, CacheResult, InvalidationTag, Namespace, StoreError};
