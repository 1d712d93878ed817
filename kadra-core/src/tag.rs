//! Invalidation tag vocabulary.
//!
//! After a mutating operation completes successfully, the business layer
//! signals the cache engine with the tags naming what changed. Each tag
//! expands to the namespaces whose cached entries may now be stale. The
//! mapping deliberately over-deletes: it is acceptable to drop more keys
//! than strictly necessary, never fewer.

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};

/// A domain event name emitted by the business layer after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationTag {
    /// Attendance records were created, corrected, or deleted.
    AttendanceRecords,
    /// Users were created, deactivated, or had profile fields changed.
    Users,
    /// Leave requests were submitted, approved, or rejected.
    LeaveRequests,
    /// Dashboard inputs changed outside the other categories.
    DashboardStats,
}

impl InvalidationTag {
    /// All tags the business layer may emit.
    pub const ALL: [InvalidationTag; 4] = [
        InvalidationTag::AttendanceRecords,
        InvalidationTag::Users,
        InvalidationTag::LeaveRequests,
        InvalidationTag::DashboardStats,
    ];

    /// The wire name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationTag::AttendanceRecords => "attendance_records",
            InvalidationTag::Users => "users",
            InvalidationTag::LeaveRequests => "leave_requests",
            InvalidationTag::DashboardStats => "dashboard_stats",
        }
    }

    /// The namespaces whose entries this tag invalidates.
    ///
    /// Attendance mutations reach the widest: they feed per-user stats,
    /// record listings, team calendars, and the dashboard. Every tag
    /// touches the dashboard or stats aggregates because those are derived
    /// from everything else.
    pub fn namespaces(&self) -> &'static [Namespace] {
        match self {
            InvalidationTag::AttendanceRecords => &[
                Namespace::AttendanceStats,
                Namespace::AttendanceRecords,
                Namespace::TeamCalendar,
                Namespace::DashboardStats,
            ],
            InvalidationTag::Users => &[Namespace::Users, Namespace::DashboardStats],
            InvalidationTag::LeaveRequests => &[
                Namespace::LeaveRequests,
                Namespace::TeamCalendar,
                Namespace::DashboardStats,
            ],
            InvalidationTag::DashboardStats => {
                &[Namespace::DashboardStats, Namespace::AttendanceStats]
            }
        }
    }

    /// Parse a tag from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for InvalidationTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for tag in InvalidationTag::ALL {
            assert_eq!(InvalidationTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(InvalidationTag::parse("not_a_tag"), None);
    }

    #[test]
    fn test_every_tag_expands_to_something() {
        for tag in InvalidationTag::ALL {
            assert!(!tag.namespaces().is_empty());
        }
    }

    #[test]
    fn test_attendance_invalidates_stats_namespace() {
        // Attendance stats are derived from attendance records, so the tag
        // must reach the stats prefix.
        assert!(InvalidationTag::AttendanceRecords
            .namespaces()
            .contains(&Namespace::AttendanceStats));
    }
}
