//! Histogram and timer providers
//!
//! The reservoir is a fixed set of log2 buckets. Updates and reads share one
//! narrow mutex so a resetting read summarizes and clears the reservoir as a
//! single step; a concurrent update lands either before or after, never half
//! in both windows.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::provider::{MetricValueProvider, rate};
use crate::value::{HistogramValue, MeterValue, TimerValue};

const LOG2_BUCKETS: usize = 64;

#[derive(Debug, Clone)]
struct Reservoir {
    buckets: [u64; LOG2_BUCKETS],
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl Reservoir {
    const fn new() -> Self {
        Self {
            buckets: [0; LOG2_BUCKETS],
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    #[inline]
    fn record(&mut self, value: u64) {
        self.buckets[bucket_index(value)] += 1;
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn summarize(&self) -> HistogramValue {
        if self.count == 0 {
            return HistogramValue::default();
        }

        HistogramValue {
            count: self.count,
            sum: self.sum,
            min: self.min.min(self.max),
            max: self.max,
            mean: self.sum as f64 / self.count as f64,
            median: self.quantile(1, 2),
            p75: self.quantile(3, 4),
            p95: self.quantile(19, 20),
            p99: self.quantile(99, 100),
        }
    }

    /// Nearest-rank estimate, reported as the bucket's upper bound clamped to
    /// the observed max.
    fn quantile(&self, numerator: u64, denominator: u64) -> u64 {
        let rank = (self.count.saturating_mul(numerator) + denominator - 1) / denominator;
        let rank = rank.clamp(1, self.count);

        let mut cumulative = 0u64;
        for (idx, c) in self.buckets.iter().copied().enumerate() {
            cumulative += c;
            if cumulative >= rank {
                return bucket_upper_bound(idx).min(self.max);
            }
        }
        self.max
    }
}

#[inline]
const fn bucket_index(value: u64) -> usize {
    if value == 0 {
        return 0;
    }
    63 - value.leading_zeros() as usize
}

const fn bucket_upper_bound(idx: usize) -> u64 {
    if idx >= 63 {
        return u64::MAX;
    }
    (1u64 << (idx + 1)) - 1
}

/// Distribution of recorded values
#[derive(Debug)]
pub struct Histogram {
    reservoir: Mutex<Reservoir>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            reservoir: Mutex::new(Reservoir::new()),
        }
    }

    /// Record a value
    #[inline]
    pub fn update(&self, value: u64) {
        self.reservoir.lock().record(value);
    }
}

impl MetricValueProvider<HistogramValue> for Histogram {
    fn value(&self, reset: bool) -> HistogramValue {
        let mut reservoir = self.reservoir.lock();
        let value = reservoir.summarize();
        if reset {
            *reservoir = Reservoir::new();
        }
        value
    }
}

/// Rate and duration distribution of a timed operation
///
/// Durations are recorded in microseconds. The rate is derived from the
/// reservoir count under the same lock, so one read never reports a rate
/// and a distribution from different windows.
#[derive(Debug)]
pub struct Timer {
    state: Mutex<TimerState>,
}

#[derive(Debug)]
struct TimerState {
    reservoir: Reservoir,
    window_start: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TimerState {
                reservoir: Reservoir::new(),
                window_start: Instant::now(),
            }),
        }
    }

    /// Record an elapsed duration
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.state.lock().reservoir.record(micros);
    }

    /// Time a closure and record its duration
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }
}

impl MetricValueProvider<TimerValue> for Timer {
    fn value(&self, reset: bool) -> TimerValue {
        let mut state = self.state.lock();
        let window = state.window_start.elapsed();
        let histogram = state.reservoir.summarize();
        if reset {
            state.reservoir = Reservoir::new();
            state.window_start = Instant::now();
        }

        TimerValue {
            rate: MeterValue {
                count: histogram.count,
                mean_rate: rate(histogram.count, window),
                window,
            },
            histogram,
        }
    }
}
