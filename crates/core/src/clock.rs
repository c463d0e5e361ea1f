//! Time sources
//!
//! Status resolution and redemption are pure functions of "now", so callers
//! that need ambient time inject a [`Clock`] rather than reading the wall
//! clock inline. Most APIs also accept an explicit `now: Timestamp` directly.

use jiff::{SignedDuration, Timestamp};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock pinned to a fixed instant, advanced manually.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: Timestamp,
}

impl FixedClock {
    /// Create a clock pinned to `now`.
    #[must_use]
    pub const fn at(now: Timestamp) -> Self {
        Self { now }
    }

    /// Pin the clock to a new instant.
    pub fn set(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Move the clock forward (or backward) by `duration`, saturating at
    /// the representable range rather than failing.
    pub fn advance(&mut self, duration: SignedDuration) {
        self.now = self
            .now
            .saturating_add(duration)
            .expect("saturating_add with a SignedDuration cannot fail");
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}
