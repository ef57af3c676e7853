#![no_main]

//! Fuzz target for YAML configuration parsing.
//!
//! # Goal
//! Arbitrary text must either parse into a configuration that builds a
//! limiter, or fail with an error. It must never panic.

use libfuzzer_sys::fuzz_target;
use tokengate::{ManualClock, RateLimiter, RateLimiterConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = RateLimiterConfig::from_yaml_str(text) {
        // Validated configuration must always produce a limiter.
        let limiter = RateLimiter::from_config_with_clock(&config, ManualClock::new(0))
            .expect("validated config rejected by limiter");
        assert_eq!(limiter.available_tokens(), config.capacity);
    }
});
