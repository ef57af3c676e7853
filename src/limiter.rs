//! Token bucket rate limiter with lazy, interval-based refill.
//!
//! The bucket starts full. Every `try_acquire` first brings the bucket up to
//! date with the clock, then takes one token if one is left. There is no
//! background timer: refill is computed from elapsed time when a caller
//! shows up.
//!
//! Two pieces of shared state have very different contention profiles:
//!
//! - the token counter is touched by every call and is a lock-free atomic
//!   updated with clamped read-modify-writes;
//! - the last-refill timestamp changes at most once per interval and is only
//!   written while holding `refill_lock`, after re-checking that the elapsed
//!   time has not already been credited by another caller.
//!
//! Callers whose clock reading is not past the last refill never touch the
//! lock.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use tracing::{debug, info, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimiterConfig;
use crate::error::{LimiterError, Result};
use crate::metrics::LimiterMetrics;

// ============================================================================
// Rate Limiter
// ============================================================================

/// Token bucket rate limiter shared by many concurrent callers.
///
/// - The bucket holds at most `capacity` tokens and starts full
/// - Every `refill_interval_millis` of elapsed clock time credits
///   `refill_rate` tokens, clamped to `capacity`
/// - Each successful `try_acquire()` consumes one token
/// - When the bucket is empty `try_acquire()` returns `false` immediately
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Current number of tokens, always in `0..=capacity`
    token_count: AtomicU64,
    /// Clock reading at which the last credited interval ended
    last_refill_millis: AtomicI64,
    /// Serializes refill bookkeeping; consumption never takes it
    refill_lock: Mutex<()>,
    /// Maximum tokens (bucket capacity)
    capacity: u64,
    /// Tokens credited per elapsed interval
    refill_rate: u32,
    /// Length of one refill interval
    refill_interval_millis: u64,
    clock: C,
    metrics: Option<LimiterMetrics>,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter driven by the system wall clock.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum tokens the bucket holds; also the initial fill
    /// * `refill_rate` - Tokens credited per elapsed interval
    /// * `refill_interval_millis` - Interval length in milliseconds
    ///
    /// # Errors
    ///
    /// Returns an error if any argument is zero.
    pub fn new(capacity: u64, refill_rate: u32, refill_interval_millis: u64) -> Result<Self> {
        Self::with_clock(capacity, refill_rate, refill_interval_millis, SystemClock)
    }

    /// Create a rate limiter from validated configuration.
    pub fn from_config(config: &RateLimiterConfig) -> Result<Self> {
        Self::from_config_with_clock(config, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter reading time from `clock`.
    ///
    /// The bucket starts full and the refill timestamp starts at the clock's
    /// current reading.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument is zero.
    pub fn with_clock(
        capacity: u64,
        refill_rate: u32,
        refill_interval_millis: u64,
        clock: C,
    ) -> Result<Self> {
        validate(capacity, refill_rate, refill_interval_millis)?;

        let now = clock.now_millis();
        info!(capacity, refill_rate, refill_interval_millis, "rate limiter created");

        Ok(Self {
            token_count: AtomicU64::new(capacity),
            last_refill_millis: AtomicI64::new(now),
            refill_lock: Mutex::new(()),
            capacity,
            refill_rate,
            refill_interval_millis,
            clock,
            metrics: None,
        })
    }

    /// Create a rate limiter from configuration, reading time from `clock`.
    pub fn from_config_with_clock(config: &RateLimiterConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Self::with_clock(
            config.capacity,
            config.refill_rate,
            config.refill_interval_millis(),
            clock,
        )
    }

    /// Attach Prometheus metrics updated on every decision and refill.
    #[must_use]
    pub fn with_metrics(mut self, metrics: LimiterMetrics) -> Self {
        metrics.available_tokens.set(gauge_value(self.available_tokens()));
        self.metrics = Some(metrics);
        self
    }

    /// Try to take one token without waiting.
    ///
    /// Returns `true` if a token was available and has been consumed,
    /// `false` if the bucket was empty. A `false` answer may still have
    /// credited a refill that another caller will consume.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.refill();

        let previous = self
            .token_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or_else(|count| count);
        let admitted = previous > 0;

        if let Some(metrics) = &self.metrics {
            if admitted {
                metrics.admitted.inc();
            } else {
                metrics.rejected.inc();
            }
            metrics
                .available_tokens
                .set(gauge_value(previous.saturating_sub(1)));
        }
        if !admitted {
            trace!("rate limiter rejected request: bucket empty");
        }

        admitted
    }

    /// Credit every whole interval elapsed since the last refill.
    fn refill(&self) {
        let now = self.clock.now_millis();

        // Fast path: nothing elapsed (or the clock went backwards).
        if now <= self.last_refill_millis.load(Ordering::SeqCst) {
            return;
        }

        // The guarded data is `()`, so a poisoned lock carries no broken state.
        let _guard = self
            .refill_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have refilled while we waited for the lock.
        let last = self.last_refill_millis.load(Ordering::SeqCst);
        if now <= last {
            return;
        }
        let elapsed = now.abs_diff(last);
        if elapsed < self.refill_interval_millis {
            return;
        }

        let periods = elapsed / self.refill_interval_millis;
        let tokens_to_add = u64::from(self.refill_rate).saturating_mul(periods);
        // Whole intervals only, so leftover time counts toward the next refill.
        // periods * interval <= elapsed, so the sum never passes `now`.
        let next = last.saturating_add_unsigned(periods * self.refill_interval_millis);
        self.last_refill_millis.store(next, Ordering::SeqCst);

        let capacity = self.capacity;
        let before = self
            .token_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_add(tokens_to_add).min(capacity))
            })
            .unwrap_or_else(|count| count);

        debug!(
            periods,
            tokens_to_add,
            tokens_before = before,
            last_refill_millis = next,
            "rate limiter refilled"
        );

        if let Some(metrics) = &self.metrics {
            metrics.refills.inc();
            metrics.tokens_credited.inc_by(tokens_to_add);
        }
    }

    /// Tokens currently in the bucket. A snapshot; concurrent callers may
    /// change it immediately.
    pub fn available_tokens(&self) -> u64 {
        self.token_count.load(Ordering::SeqCst)
    }

    /// Clock reading at which the last credited interval ended.
    pub fn last_refill_millis(&self) -> i64 {
        self.last_refill_millis.load(Ordering::SeqCst)
    }

    /// Maximum tokens the bucket holds.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens credited per elapsed interval.
    pub fn refill_rate(&self) -> u32 {
        self.refill_rate
    }

    /// Length of one refill interval in milliseconds.
    pub fn refill_interval_millis(&self) -> u64 {
        self.refill_interval_millis
    }

    /// The clock this limiter reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .field("refill_interval_millis", &self.refill_interval_millis)
            .field("available_tokens", &self.available_tokens())
            .field("last_refill_millis", &self.last_refill_millis())
            .finish()
    }
}

/// Reject parameters that would make the bucket unusable or divide by zero.
pub(crate) fn validate(capacity: u64, refill_rate: u32, refill_interval_millis: u64) -> Result<()> {
    if capacity == 0 {
        return Err(LimiterError::InvalidCapacity { value: capacity });
    }
    if refill_rate == 0 {
        return Err(LimiterError::InvalidRefillRate { value: refill_rate });
    }
    if refill_interval_millis == 0 {
        return Err(LimiterError::InvalidRefillInterval {
            value: refill_interval_millis,
        });
    }
    Ok(())
}

fn gauge_value(tokens: u64) -> i64 {
    i64::try_from(tokens).unwrap_or(i64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
