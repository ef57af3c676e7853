//! TokenGate - token bucket rate limiter for protecting a downstream resource.
//!
//! Many threads may share one [`RateLimiter`] and ask it for admission
//! concurrently. The limiter answers immediately: callers are admitted or
//! rejected, never queued. Capacity comes back lazily as clock time passes,
//! without any background timer.
//!
//! ```
//! use tokengate::{ManualClock, RateLimiter};
//! use std::sync::Arc;
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let limiter = RateLimiter::with_clock(2, 1, 1000, Arc::clone(&clock)).unwrap();
//!
//! assert!(limiter.try_acquire());
//! assert!(limiter.try_acquire());
//! assert!(!limiter.try_acquire());
//!
//! clock.advance(1000);
//! assert!(limiter.try_acquire());
//! ```
//!
//! # Modules
//!
//! - [`limiter`]: the bucket and its admission decision
//! - [`clock`]: injectable time sources
//! - [`config`]: YAML and environment configuration
//! - [`layer`]: tower middleware rejecting requests over the limit
//! - [`metrics`]: Prometheus counters for decisions and refills
//! - [`telemetry`]: tracing subscriber setup

pub mod clock;
pub mod config;
pub mod error;
pub mod layer;
pub mod limiter;
pub mod metrics;
pub mod telemetry;

pub use clock::{Clock, ManualClock, ScriptedClock, SystemClock};
pub use config::RateLimiterConfig;
pub use error::{LimiterError, Result};
pub use layer::{RateLimitLayer, RateLimitService};
pub use limiter::RateLimiter;
pub use metrics::LimiterMetrics;
