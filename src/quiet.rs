//! Process-wide notification suppression.
//!
//! A [`QuietWindow`] holds a single "suppressed until" instant shared by the
//! HTTP handlers and the scheduler. Clones share the same underlying value.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Stored value meaning "never suppressed".
const NEVER: i64 = i64::MIN;

#[derive(Debug, Clone)]
pub struct QuietWindow {
    until_ms: Arc<AtomicI64>,
}

impl Default for QuietWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl QuietWindow {
    pub fn new() -> Self {
        Self {
            until_ms: Arc::new(AtomicI64::new(NEVER)),
        }
    }

    /// Suppress notifications until `until`. Returns the previous deadline.
    pub fn set_quiet_until(&self, until: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let previous = self
            .until_ms
            .swap(until.timestamp_millis(), Ordering::AcqRel);
        from_millis(previous)
    }

    pub fn quiet_until(&self) -> Option<DateTime<Utc>> {
        from_millis(self.until_ms.load(Ordering::Acquire))
    }

    pub fn is_notifiable(&self) -> bool {
        self.is_notifiable_at(Utc::now())
    }

    pub fn is_notifiable_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.until_ms.load(Ordering::Acquire)
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    if ms == NEVER {
        return None;
    }
    DateTime::from_timestamp_millis(ms)
}
