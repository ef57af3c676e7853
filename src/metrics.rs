//! Prometheus instrumentation for a rate limiter.
//!
//! Metrics are optional. A limiter built without [`LimiterMetrics`] pays
//! nothing for them; one built with them bumps a counter per decision and
//! per credited refill.

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Counters and gauges describing one limiter.
#[derive(Debug, Clone)]
pub struct LimiterMetrics {
    /// Calls to `try_acquire` that were admitted
    pub admitted: IntCounter,
    /// Calls to `try_acquire` that were rejected
    pub rejected: IntCounter,
    /// Refills that credited at least one interval
    pub refills: IntCounter,
    /// Tokens credited by refills, before clamping to capacity
    pub tokens_credited: IntCounter,
    /// Tokens available after the most recent decision
    pub available_tokens: IntGauge,
}

impl LimiterMetrics {
    /// Create unregistered metrics named `<prefix>_admitted_total` etc.
    pub fn new(prefix: &str) -> Result<Self> {
        Ok(Self {
            admitted: IntCounter::with_opts(Opts::new(
                format!("{prefix}_admitted_total"),
                "Requests admitted by the rate limiter",
            ))?,
            rejected: IntCounter::with_opts(Opts::new(
                format!("{prefix}_rejected_total"),
                "Requests rejected by the rate limiter",
            ))?,
            refills: IntCounter::with_opts(Opts::new(
                format!("{prefix}_refills_total"),
                "Refills that credited tokens",
            ))?,
            tokens_credited: IntCounter::with_opts(Opts::new(
                format!("{prefix}_tokens_credited_total"),
                "Tokens credited by refills before clamping",
            ))?,
            available_tokens: IntGauge::with_opts(Opts::new(
                format!("{prefix}_available_tokens"),
                "Tokens available after the latest decision",
            ))?,
        })
    }

    /// Register every metric with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.admitted.clone()))?;
        registry.register(Box::new(self.rejected.clone()))?;
        registry.register(Box::new(self.refills.clone()))?;
        registry.register(Box::new(self.tokens_credited.clone()))?;
        registry.register(Box::new(self.available_tokens.clone()))?;
        Ok(())
    }
}

/// Render all metrics in `registry` in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::LimiterError::Metrics {
        details: e.to_string(),
    })
}
