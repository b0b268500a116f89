//! Concrete expiry policies applied by the access projection.

use chrono::{DateTime, Duration, Utc};

use advocase_application::ExpiryPolicy;

/// Time-bounded access: expires a fixed number of hours after the
/// assignment. Used for hearing-based assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTermExpiry {
    hours: i64,
}

impl FixedTermExpiry {
    /// Creates a policy expiring the given number of hours after
    /// assignment.
    #[must_use]
    pub fn new(hours: i64) -> Self {
        Self { hours }
    }
}

impl ExpiryPolicy for FixedTermExpiry {
    fn apply(&self, assignment_timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(assignment_timestamp + Duration::hours(self.hours))
    }
}

/// Permanent access: case-based assignments never expire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoExpiry;

impl ExpiryPolicy for NoExpiry {
    fn apply(&self, _assignment_timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }
}
