//! Clock abstraction for deterministic fact and snapshot timestamps.

use chrono::{DateTime, Utc};

/// Source of "now" for fact `occurred_at` and snapshot `created_at` values.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
