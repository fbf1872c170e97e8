//! Wall-clock helpers.
//!
//! Signed requests need a millisecond timestamp that never repeats, so
//! [`MonotonicMs`] hands out strictly increasing values even when two calls
//! land in the same millisecond or the system clock steps back slightly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Furthest a [`MonotonicMs`] value may run ahead of the wall clock.
///
/// The exchange rejects timestamps more than 1000 ms ahead of its own time (-1021).
pub const MAX_LEAD_MS: u64 = 1_000;

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Current time as **seconds** since Unix epoch.
#[inline]
pub fn now_secs() -> u64 {
    now_ms() / 1_000
}

/// Millisecond timestamp source, strictly increasing within [`MAX_LEAD_MS`].
///
/// After a small backwards step of the system clock the values keep climbing
/// by one per call and so run ahead of the wall clock. Once that lead would
/// exceed [`MAX_LEAD_MS`] the source resyncs to the wall clock instead, which
/// may repeat or go back in time. A repeated timestamp fails one request; a
/// timestamp far in the future fails every request until the clock catches up.
#[derive(Debug, Default)]
pub struct MonotonicMs {
    last: AtomicU64,
}

impl MonotonicMs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `max(now, last + 1)`, or `now` when that would lead by more than [`MAX_LEAD_MS`].
    pub fn next(&self) -> u64 {
        self.next_from(now_ms())
    }

    fn next_from(&self, now: u64) -> u64 {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let mut candidate = now.max(prev + 1);
            if candidate - now > MAX_LEAD_MS {
                candidate = now;
            }
            match self.last.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => {
                    if candidate == now && prev >= now {
                        warn!("system clock stepped back {} ms, timestamps resynced", prev - now);
                    }
                    return candidate;
                }
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_millisecond_still_increases() {
        let clock = MonotonicMs::new();
        let a = clock.next_from(1_000);
        let b = clock.next_from(1_000);
        let c = clock.next_from(1_000);
        assert_eq!((a, b, c), (1_000, 1_001, 1_002));
    }

    #[test]
    fn small_clock_step_back_is_ignored() {
        let clock = MonotonicMs::new();
        assert_eq!(clock.next_from(5_000), 5_000);
        assert_eq!(clock.next_from(4_500), 5_001);
        assert_eq!(clock.next_from(9_000), 9_000);
    }

    #[test]
    fn lead_over_wall_clock_is_bounded() {
        let clock = MonotonicMs::new();
        assert_eq!(clock.next_from(70_000), 70_000);
        // Clock steps back one minute.
        assert_eq!(clock.next_from(10_000), 10_000);
        assert_eq!(clock.next_from(10_000), 10_001);
    }

    #[test]
    fn lead_up_to_limit_keeps_increasing() {
        let clock = MonotonicMs::new();
        assert_eq!(clock.next_from(5_000), 5_000);
        assert_eq!(clock.next_from(5_000 - MAX_LEAD_MS + 1), 5_001);
        assert_eq!(clock.next_from(5_000 - MAX_LEAD_MS + 1), 5_000 - MAX_LEAD_MS + 1);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
        assert!(now_secs() > 1_577_836_800);
    }
}
