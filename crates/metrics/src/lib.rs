//! Busmetrics - Metrics
//!
//! Live metrics, the context that owns them and point-in-time snapshots.
//!
//! # Overview
//!
//! This crate provides:
//! - Metric value providers: gauges, counters, meters, histograms, timers
//! - `MetricsContext`, the explicitly constructed registry passed to every
//!   component that records or reports
//! - `SnapshotTaker` / `MetricsSnapshot`, immutable copies of a context
//! - Formatters for the report payload (JSON) and log output (human)
//!
//! # Read Semantics
//!
//! Gauges and counters are read without reset, so every snapshot sees the
//! level or running total. Meters, histograms and timers are read with reset:
//! the first snapshot after activity consumes it. Reporters on different
//! schedules share those resets; none of them gets a private delta.
//!
//! # Example
//!
//! ```
//! use busmetrics_metrics::{JsonFormatter, MetricsContext, MetricsFormatter};
//! use chrono::Utc;
//!
//! let context = MetricsContext::new("Sales");
//! context.meter("nservicebus_fetched_total").mark();
//!
//! let now = Utc::now();
//! let payload = JsonFormatter::new().format(&context.snapshot(now, now));
//! assert!(payload.contains("nservicebus_fetched_total"));
//! ```

mod context;
pub mod format;
mod histogram;
mod identity;
mod provider;
mod snapshot;
mod value;


pub use context::{EnvironmentEntry, MetricsContext};
pub use format::{HumanFormatter, JsonFormatter, MetricsFormatter, formatter_for};
pub use histogram::{Histogram, Timer};
pub use identity::MetricIdentity;
pub use provider::{Counter, FunctionGauge, Meter, MetricValueProvider, SettableGauge};
pub use snapshot::{
    MetricSample, MetricsSnapshot, REPORT_WINDOW_END, REPORT_WINDOW_START, SnapshotTaker,
    format_timestamp,
};
pub use value::{CounterValue, HistogramValue, MeterValue, TimerValue};
