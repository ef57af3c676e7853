//! Admission latency benchmarks.
//!
//! - Fast path: clock reading not past the last refill, no lock taken
//! - Refill path: every call crosses an interval boundary
//! - Contended: several threads sharing one limiter

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tokengate::{ManualClock, RateLimiter};

/// Benchmark: try_acquire() when no refill is due (target: tens of ns)
fn bench_fast_path(c: &mut Criterion) {
    let limiter = RateLimiter::with_clock(u64::MAX, 1, 1_000, ManualClock::new(0)).unwrap();

    c.bench_function("try_acquire_fast_path", |b| {
        b.iter(|| black_box(limiter.try_acquire()));
    });
}

/// Benchmark: try_acquire() when every call credits one interval
fn bench_refill_path(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(0));
    let limiter = RateLimiter::with_clock(1_000, 1, 1, Arc::clone(&clock)).unwrap();

    c.bench_function("try_acquire_refill_path", |b| {
        b.iter(|| {
            clock.advance(1);
            black_box(limiter.try_acquire())
        });
    });
}

/// Benchmark: fixed batch of calls split across threads
fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    const CALLS: usize = 10_000;

    for threads in [1usize, 2, 4, 8] {
        let limiter = RateLimiter::with_clock(u64::MAX, 1, 1_000, ManualClock::new(0)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                thread::scope(|scope| {
                    for _ in 0..threads {
                        scope.spawn(|| {
                            for _ in 0..CALLS / threads {
                                black_box(limiter.try_acquire());
                            }
                        });
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fast_path, bench_refill_path, bench_contended);
criterion_main!(benches);
