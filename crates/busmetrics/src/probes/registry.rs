//! Probe registry
//!
//! Built once at setup: each enabled builder gets its metric from the
//! context, its probe is wired to the pipeline events, and the registry
//! keeps the probes so observers can be attached afterwards.

use std::sync::Arc;

use busmetrics_metrics::{MetricIdentity, MetricsContext};
use busmetrics_pipeline::PipelineEvents;
use tracing::debug;

use super::{
    CriticalTimeProbeBuilder, DurationProbe, DurationProbeBuilder, DurationRecorded,
    MessageProcessingFailureProbeBuilder, MessageProcessingSuccessProbeBuilder,
    MessagePulledFromQueueProbeBuilder, ProbeDescriptor, ProcessingTimeProbeBuilder,
    RetriesProbeBuilder, SignalProbe, SignalProbeBuilder, Signalled,
};

const DURATION_UNIT: &str = "microseconds";
const SIGNAL_UNIT: &str = "messages";

/// Built probes of one endpoint
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    duration_probes: Vec<Arc<DurationProbe>>,
    signal_probes: Vec<Arc<SignalProbe>>,
}

impl ProbeRegistry {
    /// The fixed set of duration probe builders
    pub fn duration_builders() -> Vec<Box<dyn DurationProbeBuilder>> {
        vec![
            Box::new(CriticalTimeProbeBuilder),
            Box::new(ProcessingTimeProbeBuilder),
        ]
    }

    /// The fixed set of signal probe builders
    pub fn signal_builders() -> Vec<Box<dyn SignalProbeBuilder>> {
        vec![
            Box::new(MessagePulledFromQueueProbeBuilder),
            Box::new(MessageProcessingFailureProbeBuilder),
            Box::new(MessageProcessingSuccessProbeBuilder),
            Box::new(RetriesProbeBuilder),
        ]
    }

    /// Build every probe for which `enabled(id)` holds and wire it to `events`
    pub fn build<F>(context: &MetricsContext, events: &PipelineEvents, enabled: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut registry = Self::default();

        for builder in Self::duration_builders() {
            let descriptor = builder.descriptor();
            if !enabled(descriptor.id) {
                debug!(probe = descriptor.id, "probe disabled");
                continue;
            }
            let timer = context.timer(MetricIdentity::new(descriptor.id, DURATION_UNIT));
            let probe = Arc::new(DurationProbe::new(descriptor, timer));
            builder.wire(Arc::clone(&probe), events);
            registry.duration_probes.push(probe);
        }

        for builder in Self::signal_builders() {
            let descriptor = builder.descriptor();
            if !enabled(descriptor.id) {
                debug!(probe = descriptor.id, "probe disabled");
                continue;
            }
            let meter = context.meter(MetricIdentity::new(descriptor.id, SIGNAL_UNIT));
            let probe = Arc::new(SignalProbe::new(descriptor, meter));
            builder.wire(Arc::clone(&probe), events);
            registry.signal_probes.push(probe);
        }

        debug!(
            context = context.name(),
            duration_probes = registry.duration_probes.len(),
            signal_probes = registry.signal_probes.len(),
            "probes built"
        );
        registry
    }

    /// Descriptors of every built probe, duration probes first
    pub fn descriptors(&self) -> Vec<ProbeDescriptor> {
        self.duration_probes
            .iter()
            .map(|p| p.descriptor())
            .chain(self.signal_probes.iter().map(|p| p.descriptor()))
            .collect()
    }

    pub fn duration_probes(&self) -> &[Arc<DurationProbe>] {
        &self.duration_probes
    }

    pub fn signal_probes(&self) -> &[Arc<SignalProbe>] {
        &self.signal_probes
    }

    pub fn duration_probe(&self, id: &str) -> Option<&Arc<DurationProbe>> {
        self.duration_probes.iter().find(|p| p.descriptor().id == id)
    }

    pub fn signal_probe(&self, id: &str) -> Option<&Arc<SignalProbe>> {
        self.signal_probes.iter().find(|p| p.descriptor().id == id)
    }

    /// Observe every duration probe
    pub fn on_duration<F>(&self, observer: F)
    where
        F: Fn(&DurationRecorded) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        for probe in &self.duration_probes {
            let observer = Arc::clone(&observer);
            probe.observe(move |event| observer(event));
        }
    }

    /// Observe every signal probe
    pub fn on_signal<F>(&self, observer: F)
    where
        F: Fn(&Signalled) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        for probe in &self.signal_probes {
            let observer = Arc::clone(&observer);
            probe.observe(move |event| observer(event));
        }
    }
}
