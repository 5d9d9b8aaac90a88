//! Wall-clock abstraction.
//!
//! Every time-dependent decision in this crate (registration close points,
//! `registeredAt` stamps, last-modified markers) takes `now` as an explicit
//! argument. Callers obtain it from a [`ClockSource`], which lets tests pin
//! time to a fixed value.

use std::time::{SystemTime, UNIX_EPOCH};

/// Abstraction over the system clock for dependency injection.
pub trait ClockSource: Send + Sync {
    /// Returns the current time as milliseconds since Unix epoch.
    fn now(&self) -> u64;
}

/// Default clock source that reads the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> u64 {
        // Millisecond timestamps fit in u64 for the next few hundred million years.
        #[allow(clippy::cast_possible_truncation)]
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        millis
    }
}

/// Number of milliseconds in one hour.
pub const HOUR_MS: u64 = 60 * 60 * 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800_000);
    }
}
