//! Rate limiter configuration.
//!
//! Configuration can come from YAML or from environment variables:
//!
//! ```yaml
//! capacity: 100
//! refill_rate: 10
//! refill_interval: 1s
//! ```
//!
//! | Variable                    | Default | Meaning                      |
//! |-----------------------------|---------|------------------------------|
//! | `TOKENGATE_CAPACITY`        | `100`   | Maximum tokens in the bucket |
//! | `TOKENGATE_REFILL_RATE`     | `10`    | Tokens credited per interval |
//! | `TOKENGATE_REFILL_INTERVAL` | `1s`    | Interval, humantime syntax   |

use std::env::VarError;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{LimiterError, Result};
use crate::limiter;

/// Environment variable holding the bucket capacity.
pub const ENV_CAPACITY: &str = "TOKENGATE_CAPACITY";
/// Environment variable holding the refill rate.
pub const ENV_REFILL_RATE: &str = "TOKENGATE_REFILL_RATE";
/// Environment variable holding the refill interval.
pub const ENV_REFILL_INTERVAL: &str = "TOKENGATE_REFILL_INTERVAL";

const DEFAULT_CAPACITY: u64 = 100;
const DEFAULT_REFILL_RATE: u32 = 10;
const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(1);

/// Token bucket parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimiterConfig {
    /// Maximum tokens the bucket holds; also the initial fill
    pub capacity: u64,

    /// Tokens credited per elapsed interval
    pub refill_rate: u32,

    /// Length of one refill interval, e.g. `"1s"` or `"250ms"`
    #[serde(deserialize_with = "deserialize_duration")]
    pub refill_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            refill_rate: DEFAULT_REFILL_RATE,
            refill_interval: DEFAULT_REFILL_INTERVAL,
        }
    }
}

impl RateLimiterConfig {
    /// Parse and validate YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(yaml).map_err(|e| LimiterError::ConfigParse {
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| LimiterError::ConfigRead {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Build configuration from `TOKENGATE_*` environment variables.
    ///
    /// Unset variables fall back to defaults; set but malformed ones are
    /// errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            capacity: env_or(ENV_CAPACITY, defaults.capacity)?,
            refill_rate: env_or(ENV_REFILL_RATE, defaults.refill_rate)?,
            refill_interval: match env_var(ENV_REFILL_INTERVAL)? {
                Some(raw) => parse_duration(&raw)?,
                None => defaults.refill_interval,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Refill interval truncated to whole milliseconds.
    pub fn refill_interval_millis(&self) -> u64 {
        u64::try_from(self.refill_interval.as_millis()).unwrap_or(u64::MAX)
    }

    /// Apply the same rules as limiter construction.
    ///
    /// Intervals shorter than one millisecond truncate to zero and are
    /// rejected.
    pub fn validate(&self) -> Result<()> {
        limiter::validate(self.capacity, self.refill_rate, self.refill_interval_millis())
    }
}

/// Read `name`, treating only an unset variable as absent.
fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(raw) => Ok(Some(raw)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(raw)) => Err(LimiterError::ConfigParse {
            details: format!("{name}={raw:?}: not valid UTF-8"),
        }),
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_var(name)? {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| LimiterError::ConfigParse {
            details: format!("{name}={raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim()).map_err(|e| LimiterError::ConfigParse {
        details: format!("invalid duration {raw:?}: {e}"),
    })
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}
