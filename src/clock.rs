//! Time sources for the rate limiter.
//!
//! The limiter never reads a global clock. It is handed a [`Clock`] at
//! construction and asks it for the current time on every admission
//! decision, which lets tests replay exact timestamps instead of sleeping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Millisecond time source.
///
/// Readings may come from a monotonic or a wall clock. The limiter tolerates
/// readings that go backwards: they simply do not credit any tokens.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds.
    fn now_millis(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }
}

/// Wall clock: milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock whose time only changes when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `millis`.
    pub fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Jump to an absolute reading. Moving backwards is allowed.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward (or backward, with a negative delta) by `delta` ms.
    pub fn advance(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Clock that replays a fixed sequence of readings.
///
/// Each call to [`Clock::now_millis`] pops the next reading. Once the script
/// is exhausted the last reading repeats forever; an empty script reads 0.
#[derive(Debug)]
pub struct ScriptedClock {
    state: Mutex<ScriptState>,
}

#[derive(Debug)]
struct ScriptState {
    pending: VecDeque<i64>,
    last: i64,
}

impl ScriptedClock {
    /// Create a clock that returns `readings` in order.
    pub fn new(readings: impl IntoIterator<Item = i64>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                pending: readings.into_iter().collect(),
                last: 0,
            }),
        }
    }

    /// Number of scripted readings not yet consumed.
    pub fn remaining(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pending
            .len()
    }
}

impl Clock for ScriptedClock {
    fn now_millis(&self) -> i64 {
        // Script state is plain data, so a poisoned lock is still usable.
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(next) = state.pending.pop_front() {
            state.last = next;
        }
        state.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that the system clock reads Unix epoch milliseconds.
    #[test]
    fn test_system_clock_is_epoch_millis() {
        let before = chrono::Utc::now().timestamp_millis();
        let reading = SystemClock.now_millis();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(before <= reading && reading <= after);
    }

    /// Tests setting and shifting a manual clock in both directions.
    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_millis(), 100);

        clock.advance(50);
        assert_eq!(clock.now_millis(), 150);

        clock.advance(-200);
        assert_eq!(clock.now_millis(), -50);

        clock.set(7);
        assert_eq!(clock.now_millis(), 7);
    }

    /// Tests that a script replays in order, then repeats its last reading.
    #[test]
    fn test_scripted_clock_repeats_last_reading() {
        let clock = ScriptedClock::new([0, 10, 20]);
        assert_eq!(clock.remaining(), 3);
        assert_eq!(clock.now_millis(), 0);
        assert_eq!(clock.now_millis(), 10);
        assert_eq!(clock.now_millis(), 20);
        assert_eq!(clock.remaining(), 0);
        assert_eq!(clock.now_millis(), 20);
        assert_eq!(clock.now_millis(), 20);
    }

    /// Tests that an empty script reads zero.
    #[test]
    fn test_empty_script_reads_zero() {
        let clock = ScriptedClock::new(Vec::new());
        assert_eq!(clock.now_millis(), 0);
    }

    /// Tests that a clock shared through `Arc` sees every update.
    #[test]
    fn test_shared_clock_through_arc() {
        let clock = Arc::new(ManualClock::new(5));
        let shared: Arc<ManualClock> = Arc::clone(&clock);
        clock.advance(5);
        assert_eq!(shared.now_millis(), 10);
    }
}
