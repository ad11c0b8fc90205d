//! Probes: pipeline events turned into metrics
//!
//! A probe is built once at setup from a builder that knows which pipeline
//! event feeds it. Duration probes record into a timer, signal probes mark a
//! meter. Both are named by their probe id in the metrics context.
//!
//! | Probe id | Kind | Fed by |
//! |----------|------|--------|
//! | `nservicebus_processingtime_seconds` | duration | successful receive completed |
//! | `nservicebus_criticaltime_seconds` | duration | successful receive completed with a time-sent header |
//! | `nservicebus_fetched_total` | signal | message pulled from the queue |
//! | `nservicebus_success_total` | signal | processing succeeded |
//! | `nservicebus_failure_total` | signal | processing failed |
//! | `nservicebus_retries_total` | signal | immediate or delayed retry scheduled |

mod duration;
mod registry;
mod signal;

use std::sync::Arc;
use std::time::Duration;

use busmetrics_metrics::{Meter, Timer};
use busmetrics_pipeline::{EventSource, PipelineEvents};

pub use duration::{CriticalTimeProbeBuilder, ProcessingTimeProbeBuilder};
pub use registry::ProbeRegistry;
pub use signal::{
    MessageProcessingFailureProbeBuilder, MessageProcessingSuccessProbeBuilder,
    MessagePulledFromQueueProbeBuilder, RetriesProbeBuilder,
};

pub const PROCESSING_TIME: &str = "nservicebus_processingtime_seconds";
pub const CRITICAL_TIME: &str = "nservicebus_criticaltime_seconds";
pub const FETCHED: &str = "nservicebus_fetched_total";
pub const SUCCESS: &str = "nservicebus_success_total";
pub const FAILURE: &str = "nservicebus_failure_total";
pub const RETRIES: &str = "nservicebus_retries_total";

/// Every probe id the feature knows
pub const PROBE_IDS: [&str; 6] = [PROCESSING_TIME, CRITICAL_TIME, FETCHED, SUCCESS, FAILURE, RETRIES];

/// Whether `probe_id` names a known probe
pub fn is_known(probe_id: &str) -> bool {
    PROBE_IDS.contains(&probe_id)
}

/// Static description of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// A duration probe recorded a value
#[derive(Debug, Clone, Copy)]
pub struct DurationRecorded {
    pub probe: ProbeDescriptor,
    pub duration: Duration,
}

/// A signal probe fired
#[derive(Debug, Clone, Copy)]
pub struct Signalled {
    pub probe: ProbeDescriptor,
}

/// Records elapsed times into a timer
pub struct DurationProbe {
    descriptor: ProbeDescriptor,
    timer: Arc<Timer>,
    observers: EventSource<DurationRecorded>,
}

impl DurationProbe {
    pub fn new(descriptor: ProbeDescriptor, timer: Arc<Timer>) -> Self {
        Self {
            descriptor,
            timer,
            observers: EventSource::new(),
        }
    }

    pub fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor
    }

    pub fn record(&self, duration: Duration) {
        self.timer.record(duration);
        self.observers.raise(&DurationRecorded {
            probe: self.descriptor,
            duration,
        });
    }

    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&DurationRecorded) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer);
    }
}

impl std::fmt::Debug for DurationProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurationProbe")
            .field("id", &self.descriptor.id)
            .field("observers", &self.observers.handler_count())
            .finish()
    }
}

/// Marks a meter on every occurrence
pub struct SignalProbe {
    descriptor: ProbeDescriptor,
    meter: Arc<Meter>,
    observers: EventSource<Signalled>,
}

impl SignalProbe {
    pub fn new(descriptor: ProbeDescriptor, meter: Arc<Meter>) -> Self {
        Self {
            descriptor,
            meter,
            observers: EventSource::new(),
        }
    }

    pub fn descriptor(&self) -> ProbeDescriptor {
        self.descriptor
    }

    pub fn signal(&self) {
        self.meter.mark();
        self.observers.raise(&Signalled {
            probe: self.descriptor,
        });
    }

    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&Signalled) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer);
    }
}

impl std::fmt::Debug for SignalProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProbe")
            .field("id", &self.descriptor.id)
            .field("observers", &self.observers.handler_count())
            .finish()
    }
}

/// Builds a duration probe and attaches it to the event that feeds it
pub trait DurationProbeBuilder: Send + Sync {
    fn descriptor(&self) -> ProbeDescriptor;

    fn wire(&self, probe: Arc<DurationProbe>, events: &PipelineEvents);
}

/// Builds a signal probe and attaches it to the event that feeds it
pub trait SignalProbeBuilder: Send + Sync {
    fn descriptor(&self) -> ProbeDescriptor;

    fn wire(&self, probe: Arc<SignalProbe>, events: &PipelineEvents);
}
