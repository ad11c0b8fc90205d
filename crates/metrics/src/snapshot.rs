//! Point-in-time metric snapshots
//!
//! `SnapshotTaker` freezes a live [`MetricsContext`] into a [`MetricsSnapshot`].
//! The read mode is fixed per category:
//!
//! | Category | Read | Meaning |
//! |----------|------|---------|
//! | gauges | non-destructive | current level |
//! | counters | non-destructive | total since process start |
//! | meters | reset | activity since the last reset read |
//! | histograms | reset | distribution since the last reset read |
//! | timers | reset | timings since the last reset read |
//!
//! Resets happen inside each provider, so two reporters on different
//! schedules share them: whichever snapshots first after a burst gets the
//! burst, the other sees what accumulated after.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::context::{EnvironmentEntry, MetricsContext, Registered};
use crate::identity::MetricIdentity;
use crate::provider::MetricValueProvider;
use crate::value::{CounterValue, HistogramValue, MeterValue, TimerValue};

/// Environment key holding the start of the report window
pub const REPORT_WINDOW_START: &str = "ReportWindowStart";

/// Environment key holding the end of the report window
pub const REPORT_WINDOW_END: &str = "ReportWindowEnd";

/// Format a timestamp the way window boundaries are written:
/// `2024-01-31T12:00:05.250Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A frozen metric value with its identity
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample<V> {
    pub identity: MetricIdentity,
    pub value: V,
}

impl<V> MetricSample<V> {
    #[inline]
    pub fn name(&self) -> &str {
        self.identity.name()
    }
}

/// Immutable copy of a context's metrics at one instant
///
/// Every value is owned by the snapshot; nothing refers back to the live
/// context.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    context: String,
    captured_at: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    environment: Vec<EnvironmentEntry>,
    gauges: Vec<MetricSample<f64>>,
    counters: Vec<MetricSample<CounterValue>>,
    meters: Vec<MetricSample<MeterValue>>,
    histograms: Vec<MetricSample<HistogramValue>>,
    timers: Vec<MetricSample<TimerValue>>,
    children: Vec<MetricsSnapshot>,
}

impl MetricsSnapshot {
    #[inline]
    pub fn context(&self) -> &str {
        &self.context
    }

    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[inline]
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    #[inline]
    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    #[inline]
    pub fn environment(&self) -> &[EnvironmentEntry] {
        &self.environment
    }

    #[inline]
    pub fn gauges(&self) -> &[MetricSample<f64>] {
        &self.gauges
    }

    #[inline]
    pub fn counters(&self) -> &[MetricSample<CounterValue>] {
        &self.counters
    }

    #[inline]
    pub fn meters(&self) -> &[MetricSample<MeterValue>] {
        &self.meters
    }

    #[inline]
    pub fn histograms(&self) -> &[MetricSample<HistogramValue>] {
        &self.histograms
    }

    #[inline]
    pub fn timers(&self) -> &[MetricSample<TimerValue>] {
        &self.timers
    }

    #[inline]
    pub fn children(&self) -> &[MetricsSnapshot] {
        &self.children
    }

    /// Look up an environment value by key
    pub fn environment_value(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn gauge(&self, name: &str) -> Option<f64> {
        find(&self.gauges, name)
    }

    pub fn counter(&self, name: &str) -> Option<CounterValue> {
        find(&self.counters, name)
    }

    pub fn meter(&self, name: &str) -> Option<MeterValue> {
        find(&self.meters, name)
    }

    pub fn histogram(&self, name: &str) -> Option<HistogramValue> {
        find(&self.histograms, name)
    }

    pub fn timer(&self, name: &str) -> Option<TimerValue> {
        find(&self.timers, name)
    }

    /// Snapshot of a direct child context
    pub fn child(&self, name: &str) -> Option<&MetricsSnapshot> {
        self.children.iter().find(|c| c.context == name)
    }

    /// Whether the snapshot (children included) holds no metrics
    pub fn is_empty(&self) -> bool {
        self.gauges.is_empty()
            && self.counters.is_empty()
            && self.meters.is_empty()
            && self.histograms.is_empty()
            && self.timers.is_empty()
            && self.children.iter().all(MetricsSnapshot::is_empty)
    }
}

fn find<V: Copy>(samples: &[MetricSample<V>], name: &str) -> Option<V> {
    samples.iter().find(|s| s.name() == name).map(|s| s.value)
}

/// Builds snapshots from live contexts
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotTaker;

impl SnapshotTaker {
    const RESET_GAUGES: bool = false;
    const RESET_COUNTERS: bool = false;
    const RESET_METERS: bool = true;
    const RESET_HISTOGRAMS: bool = true;
    const RESET_TIMERS: bool = true;

    /// Freeze `context` and its children for the window `[window_start, window_end]`
    pub fn take(
        context: &MetricsContext,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> MetricsSnapshot {
        let mut environment = context.environment_entries();
        environment.push(EnvironmentEntry::new(
            REPORT_WINDOW_START,
            format_timestamp(&window_start),
        ));
        environment.push(EnvironmentEntry::new(
            REPORT_WINDOW_END,
            format_timestamp(&window_end),
        ));

        let children = context
            .child_contexts()
            .iter()
            .map(|child| Self::take(child, window_start, window_end))
            .collect();

        MetricsSnapshot {
            context: context.name().to_string(),
            captured_at: Utc::now(),
            window_start,
            window_end,
            environment,
            gauges: freeze(context.gauge_entries(), Self::RESET_GAUGES),
            counters: freeze(context.counter_entries(), Self::RESET_COUNTERS),
            meters: freeze(context.meter_entries(), Self::RESET_METERS),
            histograms: freeze(context.histogram_entries(), Self::RESET_HISTOGRAMS),
            timers: freeze(context.timer_entries(), Self::RESET_TIMERS),
            children,
        }
    }
}

fn freeze<V, P>(entries: Vec<Registered<P>>, reset: bool) -> Vec<MetricSample<V>>
where
    P: MetricValueProvider<V> + ?Sized,
{
    entries
        .into_iter()
        .map(|(identity, provider): (MetricIdentity, Arc<P>)| MetricSample {
            value: provider.value(reset),
            identity,
        })
        .collect()
}
