// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time abstraction so lifecycle timestamps are deterministic in tests.
//!
//! Every persisted entity's timestamp field is stamped through a `Clock`
//! rather than calling `Utc::now()` directly, mirroring the way the rest
//! of the engine threads a `Clock` through anything that needs `epoch_ms()`.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds.
    fn epoch_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only advances when told to. Useful for asserting
/// monotonicity properties (e.g. `timestamps.last_updated` never moves
/// backwards) without depending on wall-clock resolution.
#[derive(Clone)]
pub struct FakeClock {
    millis: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Advance the clock by `ms` milliseconds and return the new time.
    pub fn advance(&self, ms: i64) -> DateTime<Utc> {
        let new_ms = self.millis.fetch_add(ms, Ordering::SeqCst) + ms;
        DateTime::from_timestamp_millis(new_ms).unwrap_or_default()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new(Utc::now());
        let t0 = clock.now();
        let t1 = clock.advance(1000);
        assert!(t1 > t0);
        assert_eq!(clock.now(), t1);
    }

    #[test]
    fn system_clock_epoch_ms_is_positive() {
        assert!(SystemClock.epoch_ms() > 0);
    }
}
