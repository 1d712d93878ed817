//! Cache key-space namespaces.
//!
//! The backing store has a flat key space; namespaces partition it by the
//! kind of cached data. A namespace contributes the key prefix
//! (`prefix:paramHash`) and carries the default TTL for entries stored
//! under it. Defaults can be overridden per namespace in the engine
//! configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A key-space partition identifying the kind of cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Per-user attendance aggregates (hours, lateness, presence rates).
    AttendanceStats,
    /// Raw attendance record listings for a user and month.
    AttendanceRecords,
    /// Team-wide presence/absence calendars.
    TeamCalendar,
    /// User directory listings.
    Users,
    /// Leave request listings and balances.
    LeaveRequests,
    /// Company-wide dashboard aggregates.
    DashboardStats,
}

impl Namespace {
    /// All namespaces, in key-prefix order.
    pub const ALL: [Namespace; 6] = [
        Namespace::AttendanceStats,
        Namespace::AttendanceRecords,
        Namespace::TeamCalendar,
        Namespace::Users,
        Namespace::LeaveRequests,
        Namespace::DashboardStats,
    ];

    /// The key prefix for this namespace.
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::AttendanceStats => "stats",
            Namespace::AttendanceRecords => "attendance",
            Namespace::TeamCalendar => "calendar",
            Namespace::Users => "users",
            Namespace::LeaveRequests => "leave",
            Namespace::DashboardStats => "dashboard",
        }
    }

    /// The glob pattern matching every key in this namespace.
    pub fn pattern(&self) -> String {
        format!("{}:*", self.prefix())
    }

    /// Default TTL for entries in this namespace.
    ///
    /// Aggregates that are expensive to recompute keep longer TTLs; data
    /// that users expect to see change quickly keeps shorter ones.
    pub fn default_ttl(&self) -> Duration {
        match self {
            Namespace::AttendanceStats => Duration::from_secs(1800),
            Namespace::AttendanceRecords => Duration::from_secs(900),
            Namespace::TeamCalendar => Duration::from_secs(900),
            Namespace::Users => Duration::from_secs(3600),
            Namespace::LeaveRequests => Duration::from_secs(600),
            Namespace::DashboardStats => Duration::from_secs(300),
        }
    }

    /// Environment variable suffix for the per-namespace TTL override.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            Namespace::AttendanceStats => "STATS",
            Namespace::AttendanceRecords => "ATTENDANCE",
            Namespace::TeamCalendar => "CALENDAR",
            Namespace::Users => "USERS",
            Namespace::LeaveRequests => "LEAVE",
            Namespace::DashboardStats => "DASHBOARD",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}
