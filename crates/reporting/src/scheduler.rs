//! Report scheduler
//!
//! Runs one independent periodic task per registered sink. Each tick takes a
//! snapshot of the shared [`MetricsContext`] for the window since that sink's
//! previous tick, formats it and delivers it.
//!
//! # Lifecycle
//!
//! ```text
//! register(..)*  ──→  start()  ──→  [tick → snapshot → format → deliver]*  ──→  stop()
//!   validated          spawns one task per sink                    cancels, waits for
//!   immediately                                                    in-flight deliveries
//! ```
//!
//! Sinks never wait for each other. A failed or timed-out delivery is logged
//! and the sink's next tick runs as usual.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use busmetrics_metrics::{JsonFormatter, MetricsContext, MetricsFormatter};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ReportError, Result, SinkError};
use crate::sinks::ReportSink;

/// Default bound on a single delivery
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on waiting for in-flight deliveries at stop
///
/// The effective bound is never shorter than the delivery timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Registration {
    name: String,
    sink: Arc<dyn ReportSink>,
    formatter: Arc<dyn MetricsFormatter>,
    interval: Duration,
}

/// One sink's periodic report task
struct SinkTask {
    registration: Registration,
    context: Arc<MetricsContext>,
    delivery_timeout: Duration,
}

impl SinkTask {
    async fn run(self, started_at: DateTime<Utc>, cancel: CancellationToken) {
        let period = self.registration.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            report = %self.registration.name,
            kind = self.registration.sink.kind(),
            destination = self.registration.sink.destination(),
            interval_ms = period.as_millis() as u64,
            "metrics report started"
        );

        let mut window_start = started_at;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Once a tick has fired its delivery runs to completion
            let window_end = Utc::now();
            self.report(window_start, window_end).await;
            window_start = window_end;
        }

        debug!(report = %self.registration.name, "metrics report stopped");
    }

    async fn report(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) {
        let snapshot = self.context.snapshot(window_start, window_end);
        let payload = self.registration.formatter.format(&snapshot);
        let sink = &self.registration.sink;

        let delivery = AssertUnwindSafe(timeout(self.delivery_timeout, sink.deliver(&payload)));
        let result = match delivery.catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SinkError::Timeout {
                destination: sink.destination().to_string(),
                timeout: self.delivery_timeout,
            }),
            Err(panic) => Err(SinkError::Panicked(panic_message(panic.as_ref()))),
        };

        if let Err(e) = result {
            let destination = sink.destination();
            error!(
                report = %self.registration.name,
                kind = sink.kind(),
                destination,
                error = %e,
                "Error while sending metric data to {destination}"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Schedules snapshot delivery to every registered sink
pub struct ReportScheduler {
    context: Arc<MetricsContext>,
    registrations: Vec<Registration>,
    delivery_timeout: Duration,
    shutdown_timeout: Duration,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl ReportScheduler {
    pub fn new(context: Arc<MetricsContext>) -> Self {
        Self {
            context,
            registrations: Vec::new(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
            started: false,
        }
    }

    /// Bound each delivery; a slower one is abandoned and logged as failed
    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Bound the wait for in-flight deliveries at stop
    ///
    /// A delivery that already started is always given its full delivery
    /// timeout, so the wait is the longer of the two.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Register a sink receiving JSON report payloads
    pub fn register(
        &mut self,
        name: impl Into<String>,
        sink: Arc<dyn ReportSink>,
        interval: Duration,
    ) -> Result<()> {
        self.register_with_formatter(name, sink, interval, Arc::new(JsonFormatter::new()))
    }

    /// Register a sink with its own payload formatter
    pub fn register_with_formatter(
        &mut self,
        name: impl Into<String>,
        sink: Arc<dyn ReportSink>,
        interval: Duration,
        formatter: Arc<dyn MetricsFormatter>,
    ) -> Result<()> {
        let name = name.into();
        if self.started {
            return Err(ReportError::AlreadyStarted);
        }
        if interval.is_zero() {
            return Err(ReportError::InvalidInterval { name });
        }
        if self.registrations.iter().any(|r| r.name == name) {
            return Err(ReportError::DuplicateReport(name));
        }

        self.registrations.push(Registration {
            name,
            sink,
            formatter,
            interval,
        });
        Ok(())
    }

    /// Number of registered sinks
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Whether reports are currently running
    pub fn is_running(&self) -> bool {
        self.started && !self.cancel.is_cancelled()
    }

    /// Spawn one report task per registered sink
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(ReportError::AlreadyStarted);
        }
        self.started = true;

        let started_at = Utc::now();
        for registration in &self.registrations {
            let task = SinkTask {
                registration: registration.clone(),
                context: Arc::clone(&self.context),
                delivery_timeout: self.delivery_timeout,
            };
            let cancel = self.cancel.clone();
            self.handles
                .push(tokio::spawn(task.run(started_at, cancel)));
        }

        info!(reports = self.handles.len(), "report scheduler started");
        Ok(())
    }

    /// Stop all report tasks
    ///
    /// No tick starts after this is called. Deliveries already in flight are
    /// awaited up to the longer of the shutdown and delivery timeouts, then
    /// abandoned.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut self.handles);
        if handles.is_empty() {
            return;
        }

        let bound = self.shutdown_timeout.max(self.delivery_timeout);
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if timeout(bound, join_all(handles)).await.is_err() {
            warn!(
                timeout_ms = bound.as_millis() as u64,
                "metrics reports did not stop in time, abandoning in-flight deliveries"
            );
            for abort in aborts {
                abort.abort();
            }
        }
        info!("report scheduler stopped");
    }
}

impl Drop for ReportScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ReportScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportScheduler")
            .field("context", &self.context.name())
            .field("registrations", &self.registrations.len())
            .field("tasks", &self.handles.len())
            .field("running", &self.is_running())
            .finish()
    }
}
