//! Shared vocabulary for the kadra cache engine.
//!
//! This crate defines the types that the cache engine and the business layer
//! agree on: the namespace partitioning of the key space, the invalidation
//! tag vocabulary emitted after mutating writes, the typed parameter structs
//! used to build cache keys, and the error taxonomy. It performs no I/O.

pub mod error;
pub mod namespace;
pub mod params;
pub mod tag;

pub use error::{CacheResult, StoreError};
pub use namespace::Namespace;
pub use params::{
    AttendanceRecordsParams, AttendanceStatsParams, CacheParams, DashboardStatsParams,
    LeaveRequestsParams, TeamCalendarParams, UserDirectoryParams,
};
pub use tag::InvalidationTag;
