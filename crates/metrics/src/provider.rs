//! Metric value providers
//!
//! Every live metric implements [`MetricValueProvider`]. A read either leaves
//! the metric untouched (`reset = false`) or returns the accumulated state and
//! clears it in the same operation (`reset = true`). Whoever reads with reset
//! first owns the data; later readers see only what accumulated since.
//!
//! All providers are internally synchronized. There is no global lock: each
//! metric is atomic on its own.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::value::{CounterValue, MeterValue};

/// Read access to a live metric
pub trait MetricValueProvider<V>: Send + Sync {
    /// Read the current value, clearing accumulated state when `reset` is true
    fn value(&self, reset: bool) -> V;
}

/// Atomic counter
///
/// Counts since process start. Snapshots read it without reset, so every
/// report sees the running total.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    /// Create a new counter initialized to 0
    #[inline]
    pub const fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    /// Increment the counter by `val` (relaxed ordering for performance)
    #[inline]
    pub fn increment_by(&self, val: i64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Increment the counter by 1
    #[inline]
    pub fn increment(&self) {
        self.increment_by(1);
    }

    /// Decrement the counter by 1
    #[inline]
    pub fn decrement(&self) {
        self.increment_by(-1);
    }

    /// Get the current value (relaxed ordering)
    #[inline]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset the counter to 0 and return the previous value
    #[inline]
    pub fn take(&self) -> i64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

impl MetricValueProvider<CounterValue> for Counter {
    fn value(&self, reset: bool) -> CounterValue {
        let count = if reset { self.take() } else { self.get() };
        CounterValue { count }
    }
}

/// Gauge backed by a closure evaluated on every read
pub struct FunctionGauge {
    read: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl FunctionGauge {
    pub fn new<F>(read: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self {
            read: Box::new(read),
        }
    }
}

impl std::fmt::Debug for FunctionGauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGauge").finish_non_exhaustive()
    }
}

impl MetricValueProvider<f64> for FunctionGauge {
    fn value(&self, _reset: bool) -> f64 {
        (self.read)()
    }
}

/// Gauge holding the last value set
#[derive(Debug, Default)]
pub struct SettableGauge(AtomicU64);

impl SettableGauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0f64.to_bits()))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl MetricValueProvider<f64> for SettableGauge {
    fn value(&self, _reset: bool) -> f64 {
        self.get()
    }
}

/// Event meter
///
/// Marks are a single atomic add. A reset read swaps the count out and starts
/// a new window under a short lock, so two concurrent resetting readers never
/// both see the same marks.
#[derive(Debug)]
pub struct Meter {
    count: AtomicU64,
    window_start: Mutex<Instant>,
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Record one event
    #[inline]
    pub fn mark(&self) {
        self.mark_many(1);
    }

    /// Record `n` events
    #[inline]
    pub fn mark_many(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Events marked in the current window
    #[inline]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl MetricValueProvider<MeterValue> for Meter {
    fn value(&self, reset: bool) -> MeterValue {
        let mut window_start = self.window_start.lock();
        let window = window_start.elapsed();

        let count = if reset {
            *window_start = Instant::now();
            self.count.swap(0, Ordering::AcqRel)
        } else {
            self.count.load(Ordering::Acquire)
        };

        MeterValue {
            count,
            mean_rate: rate(count, window),
            window,
        }
    }
}

/// Calculate rate per second
#[inline]
pub(crate) fn rate(count: u64, window: Duration) -> f64 {
    let secs = window.as_secs_f64();
    if secs <= 0.0 {
        0.0
    } else {
        count as f64 / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_operations() {
        let counter = Counter::new();
        counter.increment();
        counter.increment_by(5);
        counter.decrement();
        assert_eq!(counter.get(), 5);
        assert_eq!(counter.value(false).count, 5);
        assert_eq!(counter.value(false).count, 5);
        assert_eq!(counter.value(true).count, 5);
        assert_eq!(counter.value(false).count, 0);
    }

    #[test]
    fn test_function_gauge_reads_closure() {
        let backing = Arc::new(AtomicU64::new(7));
        let read = Arc::clone(&backing);
        let gauge = FunctionGauge::new(move || read.load(Ordering::Relaxed) as f64);

        assert_eq!(gauge.value(false), 7.0);
        backing.store(9, Ordering::Relaxed);
        assert_eq!(gauge.value(true), 9.0);
        assert_eq!(gauge.value(true), 9.0);
    }

    #[test]
    fn test_settable_gauge() {
        let gauge = SettableGauge::new();
        assert_eq!(gauge.value(false), 0.0);
        gauge.set(42.5);
        assert_eq!(gauge.value(true), 42.5);
        assert_eq!(gauge.value(false), 42.5);
    }

    #[test]
    fn test_meter_reset_hands_data_to_first_reader() {
        let meter = Meter::new();
        for _ in 0..10 {
            meter.mark();
        }

        assert_eq!(meter.value(false).count, 10);
        assert_eq!(meter.value(true).count, 10);
        assert_eq!(meter.value(true).count, 0);
    }

    #[test]
    fn test_meter_concurrent_marks_are_not_lost() {
        let meter = Arc::new(Meter::new());
        let mut handles = Vec::new();

        for _ in 0..4 {
            let meter = Arc::clone(&meter);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    meter.mark();
                }
            }));
        }

        let mut seen = 0;
        for handle in handles {
            seen += meter.value(true).count;
            handle.join().unwrap();
        }
        seen += meter.value(true).count;

        assert_eq!(seen, 4000);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(100, Duration::from_secs(10)), 10.0);
        assert_eq!(rate(100, Duration::ZERO), 0.0);
    }
}
