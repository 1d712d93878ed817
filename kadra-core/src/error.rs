//! Error types for cache engine operations.

use std::time::Duration;
use thiserror::Error;

/// Cache backend errors.
///
/// Every variant here is recoverable from the caller's point of view: the
/// engine's consumers degrade fail-open (reads behave as misses, writes are
/// logged and dropped). The store implementations report failures truthfully
/// so the health monitor can observe them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend connection failed: {reason}")]
    Connection { reason: String },

    #[error("backend operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("backend protocol error: {reason}")]
    Protocol { reason: String },

    #[error("cached payload could not be decoded: {reason}")]
    Serialization { reason: String },
}

impl StoreError {
    /// Create a connection error from any displayable cause.
    pub fn connection(reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            reason: reason.to_string(),
        }
    }

    /// Create a protocol error from any displayable cause.
    pub fn protocol(reason: impl std::fmt::Display) -> Self {
        Self::Protocol {
            reason: reason.to_string(),
        }
    }

    /// Create a serialization error from any displayable cause.
    pub fn serialization(reason: impl std::fmt::Display) -> Self {
        Self::Serialization {
            reason: reason.to_string(),
        }
    }

    /// Whether this error indicates the backend is unreachable, as opposed
    /// to a malformed key or payload.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Result alias for cache backend operations.
pub type CacheResult<T> = Result<T, StoreError>;
