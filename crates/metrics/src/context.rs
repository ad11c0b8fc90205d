//! Metrics context
//!
//! The process-scoped container of live metrics. One root context is built
//! at setup and passed explicitly to everything that records or reports.
//!
//! # Locking
//!
//! Each category is an `RwLock<Vec<..>>` of `Arc`'d providers. Registration
//! takes the write lock once per metric name; recording never touches these
//! locks because callers hold the `Arc` returned at registration. Snapshots
//! clone the `Arc` list under a short read lock and read providers after
//! releasing it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::histogram::{Histogram, Timer};
use crate::identity::MetricIdentity;
use crate::provider::{Counter, FunctionGauge, Meter, MetricValueProvider};
use crate::snapshot::{MetricsSnapshot, SnapshotTaker};

/// One environment key/value pair carried into every snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentEntry {
    pub name: String,
    pub value: String,
}

impl EnvironmentEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Registered metric: its identity and live provider
pub(crate) type Registered<P> = (MetricIdentity, Arc<P>);

/// Metrics of one category, unique by name
struct Registry<P: ?Sized> {
    entries: RwLock<Vec<Registered<P>>>,
}

impl<P: ?Sized> Registry<P> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn find(&self, name: &str) -> Option<Arc<P>> {
        self.entries
            .read()
            .iter()
            .find(|(id, _)| id.name() == name)
            .map(|(_, p)| Arc::clone(p))
    }

    /// Return the provider registered under the identity's name, creating it
    /// if absent. The first registration's unit and tags win.
    fn get_or_insert_with(
        &self,
        identity: MetricIdentity,
        create: impl FnOnce() -> Arc<P>,
    ) -> Arc<P> {
        if let Some(existing) = self.find(identity.name()) {
            return existing;
        }

        let mut entries = self.entries.write();
        if let Some((_, existing)) = entries.iter().find(|(id, _)| id.name() == identity.name()) {
            return Arc::clone(existing);
        }

        let provider = create();
        entries.push((identity, Arc::clone(&provider)));
        provider
    }

    fn entries(&self) -> Vec<Registered<P>> {
        self.entries.read().clone()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Live, process-lifetime metrics container
///
/// # Example
///
/// ```
/// use busmetrics_metrics::{MetricIdentity, MetricsContext};
///
/// let context = MetricsContext::new("Sales");
/// let fetched = context.meter(MetricIdentity::new("nservicebus_fetched_total", "Messages"));
/// fetched.mark();
///
/// let endpoint = context.context("Billing");
/// endpoint.counter("QueueLengthSend_Billing").increment();
/// ```
pub struct MetricsContext {
    name: String,
    environment: RwLock<Vec<EnvironmentEntry>>,
    gauges: Registry<dyn MetricValueProvider<f64>>,
    counters: Registry<Counter>,
    meters: Registry<Meter>,
    histograms: Registry<Histogram>,
    timers: Registry<Timer>,
    children: RwLock<BTreeMap<String, Arc<MetricsContext>>>,
}

impl MetricsContext {
    /// Create an empty context
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: RwLock::new(Vec::new()),
            gauges: Registry::new(),
            counters: Registry::new(),
            meters: Registry::new(),
            histograms: Registry::new(),
            timers: Registry::new(),
            children: RwLock::new(BTreeMap::new()),
        }
    }

    /// Add an environment entry (builder form)
    #[must_use]
    pub fn with_environment(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_environment(name, value);
        self
    }

    /// Add an environment entry
    pub fn add_environment(&self, name: impl Into<String>, value: impl Into<String>) {
        self.environment
            .write()
            .push(EnvironmentEntry::new(name, value));
    }

    /// Context name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a gauge evaluated on every snapshot
    ///
    /// A second registration under the same name keeps the first gauge.
    pub fn gauge<F>(&self, identity: impl Into<MetricIdentity>, read: F)
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let identity = identity.into();
        let name = identity.name().to_string();
        let mut created = false;
        self.gauges.get_or_insert_with(identity, || {
            created = true;
            Arc::new(FunctionGauge::new(read)) as Arc<dyn MetricValueProvider<f64>>
        });
        if !created {
            debug!(context = %self.name, gauge = %name, "gauge already registered");
        }
    }

    /// Register any gauge provider, e.g. a shared
    /// [`SettableGauge`](crate::SettableGauge)
    ///
    /// A second registration under the same name keeps the first gauge.
    pub fn register_gauge(
        &self,
        identity: impl Into<MetricIdentity>,
        provider: Arc<dyn MetricValueProvider<f64>>,
    ) {
        self.gauges.get_or_insert_with(identity.into(), || provider);
    }

    /// Get or create a counter
    pub fn counter(&self, identity: impl Into<MetricIdentity>) -> Arc<Counter> {
        self.counters
            .get_or_insert_with(identity.into(), || Arc::new(Counter::new()))
    }

    /// Get or create a meter
    pub fn meter(&self, identity: impl Into<MetricIdentity>) -> Arc<Meter> {
        self.meters
            .get_or_insert_with(identity.into(), || Arc::new(Meter::new()))
    }

    /// Get or create a histogram
    pub fn histogram(&self, identity: impl Into<MetricIdentity>) -> Arc<Histogram> {
        self.histograms
            .get_or_insert_with(identity.into(), || Arc::new(Histogram::new()))
    }

    /// Get or create a timer
    pub fn timer(&self, identity: impl Into<MetricIdentity>) -> Arc<Timer> {
        self.timers
            .get_or_insert_with(identity.into(), || Arc::new(Timer::new()))
    }

    /// Get or create a child context
    pub fn context(&self, name: &str) -> Arc<MetricsContext> {
        if let Some(child) = self.children.read().get(name) {
            return Arc::clone(child);
        }

        let mut children = self.children.write();
        Arc::clone(
            children
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MetricsContext::new(name))),
        )
    }

    /// Total number of metrics registered directly in this context
    pub fn metric_count(&self) -> usize {
        self.gauges.len()
            + self.counters.len()
            + self.meters.len()
            + self.histograms.len()
            + self.timers.len()
    }

    /// Take a snapshot of this context and all children
    pub fn snapshot(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> MetricsSnapshot {
        SnapshotTaker::take(self, window_start, window_end)
    }

    pub(crate) fn environment_entries(&self) -> Vec<EnvironmentEntry> {
        self.environment.read().clone()
    }

    pub(crate) fn gauge_entries(&self) -> Vec<Registered<dyn MetricValueProvider<f64>>> {
        self.gauges.entries()
    }

    pub(crate) fn counter_entries(&self) -> Vec<Registered<Counter>> {
        self.counters.entries()
    }

    pub(crate) fn meter_entries(&self) -> Vec<Registered<Meter>> {
        self.meters.entries()
    }

    pub(crate) fn histogram_entries(&self) -> Vec<Registered<Histogram>> {
        self.histograms.entries()
    }

    pub(crate) fn timer_entries(&self) -> Vec<Registered<Timer>> {
        self.timers.entries()
    }

    pub(crate) fn child_contexts(&self) -> Vec<Arc<MetricsContext>> {
        self.children.read().values().cloned().collect()
    }
}

impl std::fmt::Debug for MetricsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsContext")
            .field("name", &self.name)
            .field("metrics", &self.metric_count())
            .field("children", &self.children.read().len())
            .finish()
    }
}
