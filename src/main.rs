//! TokenGate load driver.
//!
//! Builds a limiter from flags, environment or a YAML file, hammers it from
//! several worker threads for a fixed duration, and reports how many calls
//! were admitted.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use mimalloc::MiMalloc;
use prometheus::Registry;
use tracing::{debug, error, info};

use tokengate::config::{ENV_CAPACITY, ENV_REFILL_INTERVAL, ENV_REFILL_RATE};
use tokengate::metrics::{LimiterMetrics, encode_text};
use tokengate::telemetry::{LogFormat, init_tracing};
use tokengate::{RateLimiter, RateLimiterConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Drive a token bucket rate limiter from concurrent workers.
#[derive(Debug, Parser)]
#[command(name = "tokengate", version, about)]
struct Cli {
    /// YAML configuration file; overrides the bucket flags below
    #[arg(long, short = 'c', env = "TOKENGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum tokens in the bucket
    #[arg(long, env = ENV_CAPACITY, default_value_t = 100)]
    capacity: u64,

    /// Tokens credited per refill interval
    #[arg(long, env = ENV_REFILL_RATE, default_value_t = 10)]
    refill_rate: u32,

    /// Refill interval, e.g. "1s" or "250ms"
    #[arg(long, env = ENV_REFILL_INTERVAL, default_value = "1s", value_parser = humantime::parse_duration)]
    refill_interval: Duration,

    /// Worker threads calling try_acquire
    #[arg(long, short = 'w', default_value_t = 4)]
    workers: usize,

    /// How long to run
    #[arg(long, short = 'd', default_value = "5s", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Pause between calls in each worker
    #[arg(long, default_value = "1ms", value_parser = humantime::parse_duration)]
    pause: Duration,

    /// Print Prometheus metrics when done
    #[arg(long)]
    print_metrics: bool,

    /// Log format: pretty or json
    #[arg(long, env = "TOKENGATE_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
}

impl Cli {
    fn limiter_config(&self) -> tokengate::Result<RateLimiterConfig> {
        match &self.config {
            Some(path) => RateLimiterConfig::from_file(path),
            None => {
                let config = RateLimiterConfig {
                    capacity: self.capacity,
                    refill_rate: self.refill_rate,
                    refill_interval: self.refill_interval,
                };
                config.validate()?;
                Ok(config)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.limiter_config().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let registry = Registry::new();
    let metrics = LimiterMetrics::new("tokengate")?;
    metrics.register(&registry)?;

    let limiter = Arc::new(RateLimiter::from_config(&config)?.with_metrics(metrics.clone()));
    info!(
        workers = cli.workers,
        duration = %humantime::format_duration(cli.duration),
        "starting load"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let started = Instant::now();
    let handles: Vec<_> = (0..cli.workers)
        .map(|worker| {
            let limiter = Arc::clone(&limiter);
            let stop = Arc::clone(&stop);
            let pause = cli.pause;
            thread::spawn(move || {
                let (mut admitted, mut rejected) = (0u64, 0u64);
                while !stop.load(Ordering::Relaxed) {
                    if limiter.try_acquire() {
                        admitted += 1;
                    } else {
                        rejected += 1;
                    }
                    if !pause.is_zero() {
                        thread::sleep(pause);
                    }
                }
                debug!(worker, admitted, rejected, "worker finished");
            })
        })
        .collect();

    thread::sleep(cli.duration);
    stop.store(true, Ordering::Relaxed);
    for handle in handles {
        if handle.join().is_err() {
            error!("worker thread panicked");
        }
    }

    let elapsed = started.elapsed();
    let admitted = metrics.admitted.get();
    info!(
        admitted,
        rejected = metrics.rejected.get(),
        refills = metrics.refills.get(),
        admitted_per_sec = admitted as f64 / elapsed.as_secs_f64(),
        "load finished"
    );

    if cli.print_metrics {
        print!("{}", encode_text(&registry)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that bucket flags build the configuration when no file is given.
    #[test]
    fn test_flags_build_config() {
        let cli = Cli::try_parse_from([
            "tokengate",
            "--capacity",
            "7",
            "--refill-rate",
            "2",
            "--refill-interval",
            "250ms",
        ])
        .unwrap();

        let config = cli.limiter_config().unwrap();
        assert_eq!(config.capacity, 7);
        assert_eq!(config.refill_rate, 2);
        assert_eq!(config.refill_interval, Duration::from_millis(250));
    }

    /// Tests that `--config` takes precedence over the bucket flags.
    #[test]
    fn test_config_file_overrides_flags() {
        let dir = std::env::temp_dir().join(format!("tokengate-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("limiter.yaml");
        std::fs::write(&path, "capacity: 3\nrefill_rate: 1\nrefill_interval: 2s\n").unwrap();

        let args: Vec<std::ffi::OsString> = vec![
            "tokengate".into(),
            "--config".into(),
            path.clone().into_os_string(),
            "--capacity".into(),
            "500".into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let config = cli.limiter_config();
        std::fs::remove_dir_all(&dir).unwrap();

        let config = config.unwrap();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.refill_interval, Duration::from_secs(2));
    }

    /// Tests that invalid bucket flags are rejected before any load runs.
    #[test]
    fn test_zero_capacity_flag_rejected() {
        let cli = Cli::try_parse_from(["tokengate", "--capacity", "0"]).unwrap();
        assert!(matches!(
            cli.limiter_config(),
            Err(tokengate::LimiterError::InvalidCapacity { value: 0 })
        ));
    }
}
