//! Busmetrics - Reporting
//!
//! Delivers metric snapshots to sinks, each on its own schedule.
//!
//! # Overview
//!
//! - `ReportSink` trait with transport, log, trace and custom sinks
//! - `ReportScheduler`, one periodic task per registered sink
//!
//! Snapshots reset meters, histograms and timers. Every sink reads the same
//! [`MetricsContext`](busmetrics_metrics::MetricsContext), so when two sinks
//! run on different intervals, the one that ticks first after a burst gets it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use busmetrics_reporting::{ReportScheduler, TransportSink};
//!
//! let mut scheduler = ReportScheduler::new(context);
//! scheduler.register(
//!     "transport:Particular.Monitoring",
//!     Arc::new(TransportSink::new("Particular.Monitoring", transport, "Sales", host_id)),
//!     Duration::from_secs(10),
//! )?;
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await;
//! ```

mod error;
mod scheduler;
mod sinks;

#[cfg(any(test, feature = "test-util"))]
pub mod capture;
#[cfg(test)]
mod scheduler_test;

pub use error::{ReportError, Result, SinkError};
pub use scheduler::{DEFAULT_DELIVERY_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT, ReportScheduler};
pub use sinks::{
    CustomSink, LogSink, METRIC_REPORT_TYPE, ORIGINATING_HOST_ID, REPORT_TARGET, ReportSink,
    TRACE_TARGET, TraceSink, TransportSink,
};
