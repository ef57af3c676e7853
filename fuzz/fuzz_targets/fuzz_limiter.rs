#![no_main]

//! Fuzz target for bucket state transitions.
//!
//! # Goal
//! For any parameters and any sequence of clock readings (including
//! backwards jumps and extreme values):
//! - the token count stays within `0..=capacity`
//! - the refill timestamp never decreases and moves in whole intervals
//! - no arithmetic overflow panics

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use tokengate::{Clock, ManualClock, RateLimiter};

#[derive(Debug, Arbitrary)]
struct Input {
    capacity: u64,
    refill_rate: u32,
    refill_interval_millis: u64,
    start: i64,
    steps: Vec<Step>,
}

#[derive(Debug, Arbitrary)]
enum Step {
    Acquire,
    Set(i64),
    Advance(i32),
}

fuzz_target!(|input: Input| {
    let clock = Arc::new(ManualClock::new(input.start));
    let Ok(limiter) = RateLimiter::with_clock(
        input.capacity,
        input.refill_rate,
        input.refill_interval_millis,
        Arc::clone(&clock),
    ) else {
        return;
    };

    let mut last = limiter.last_refill_millis();
    for step in input.steps.iter().take(1024) {
        match step {
            Step::Acquire => {
                let _ = limiter.try_acquire();
            }
            Step::Set(t) => clock.set(*t),
            Step::Advance(d) => clock.set(clock.now_millis().saturating_add(i64::from(*d))),
        }

        assert!(limiter.available_tokens() <= input.capacity);
        let now_last = limiter.last_refill_millis();
        assert!(now_last >= last);
        assert_eq!(now_last.abs_diff(last) % input.refill_interval_millis, 0);
        last = now_last;
    }
});
