//! Host-side baseline for interpreter timings.
//!
//! Times a single evaluation of the doubly recursive Fibonacci function executed by Rust itself, so interpreter
//! runs of the same workload have a reference point (for example before and after adding memoization).
//!
//! ## Notes
//!
//! - Exactly one timed run per strategy. No warm-up, no repetitions, no statistics.
//! - The plain strategy is the reference measurement. [`Memoized`] is the opt-in extension point and wraps any
//!   [`Recurrence`], not just Fibonacci.
//! - This crate has no pass/fail semantics and does not depend on the harness crate.

use std::collections::HashMap;
use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Input used when the caller does not pick one. Large enough to be measurable with the plain strategy.
pub const DEFAULT_N: u32 = 35;

/// Largest input whose Fibonacci number fits in a `u64`.
pub const MAX_N: u32 = 93;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BenchError {
    #[error("fib({n}) does not fit in 64 bits; n must be at most {max}", max = MAX_N)]
    OutOfRange { n: u32 },
}

/// Plain doubly recursive Fibonacci. `n` must not exceed [`MAX_N`].
pub fn fib(n: u32) -> u64 {
    if n < 2 {
        return u64::from(n);
    }
    fib(n - 2) + fib(n - 1)
}

/// A recursive definition whose self-calls go through `recur`, so a wrapper can intercept them.
pub trait Recurrence {
    fn step(&self, n: u32, recur: &mut dyn FnMut(u32) -> u64) -> u64;
}

/// Fibonacci expressed as a [`Recurrence`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Fibonacci;

impl Recurrence for Fibonacci {
    fn step(&self, n: u32, recur: &mut dyn FnMut(u32) -> u64) -> u64 {
        if n < 2 {
            return u64::from(n);
        }
        recur(n - 2) + recur(n - 1)
    }
}

/// Memoizing wrapper around a [`Recurrence`].
///
/// The cache lives as long as the wrapper, so evaluating twice on the same instance measures a warm cache.
#[derive(Debug, Default)]
pub struct Memoized<R> {
    inner: R,
    cache: HashMap<u32, u64>,
}

impl<R: Recurrence> Memoized<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    pub fn eval(&mut self, n: u32) -> u64 {
        eval_cached(&self.inner, &mut self.cache, n)
    }

    /// Number of distinct inputs evaluated so far.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn eval_cached<R: Recurrence>(inner: &R, cache: &mut HashMap<u32, u64>, n: u32) -> u64 {
    if let Some(&value) = cache.get(&n) {
        return value;
    }
    let value = inner.step(n, &mut |k| eval_cached(inner, cache, k));
    cache.insert(n, value);
    value
}

/// Evaluation strategy for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Plain,
    Memoized,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Plain => write!(f, "plain"),
            Strategy::Memoized => write!(f, "memoized"),
        }
    }
}

/// Result of one timed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub strategy: Strategy,
    pub n: u32,
    pub value: u64,
    pub elapsed: Duration,
}

impl Measurement {
    pub fn micros(&self) -> u128 {
        self.elapsed.as_micros()
    }
}

/// Evaluate `fib(n)` once with `strategy` and time it on the monotonic clock.
#[tracing::instrument(level = "debug")]
pub fn measure(strategy: Strategy, n: u32) -> Result<Measurement, BenchError> {
    if n > MAX_N {
        return Err(BenchError::OutOfRange { n });
    }
    let start = Instant::now();
    let value = match strategy {
        Strategy::Plain => fib(black_box(n)),
        Strategy::Memoized => Memoized::new(Fibonacci).eval(black_box(n)),
    };
    let value = black_box(value);
    // Clock granularity can report zero for tiny memoized runs.
    let elapsed = start.elapsed().max(Duration::from_nanos(1));
    let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    tracing::debug!(%strategy, n, value, elapsed_us, "measured");

    Ok(Measurement {
        strategy,
        n,
        value,
        elapsed,
    })
}
