//! Frozen metric values
//!
//! These are what a provider hands out on read. They hold no reference to
//! live state, so a snapshot built from them never aliases the context.

use std::time::Duration;

/// Value of a counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValue {
    /// Current count (may be negative after decrements)
    pub count: i64,
}

/// Value of a meter over its current window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterValue {
    /// Events marked in the window
    pub count: u64,
    /// Events per second over the window
    pub mean_rate: f64,
    /// Length of the window the value covers
    pub window: Duration,
}

/// Summary of a histogram reservoir
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramValue {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub median: u64,
    pub p75: u64,
    pub p95: u64,
    pub p99: u64,
}

/// Value of a timer: how often it was recorded and how long it took
///
/// Histogram values are in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerValue {
    pub rate: MeterValue,
    pub histogram: HistogramValue,
}

impl TimerValue {
    /// Mean recorded duration
    pub fn mean_duration(&self) -> Duration {
        Duration::from_secs_f64(self.histogram.mean / 1_000_000.0)
    }
}
