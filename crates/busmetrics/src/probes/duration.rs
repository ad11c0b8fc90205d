//! Duration probe builders

use std::sync::Arc;

use busmetrics_pipeline::PipelineEvents;

use super::{CRITICAL_TIME, DurationProbe, DurationProbeBuilder, PROCESSING_TIME, ProbeDescriptor};

/// Time spent inside the receive pipeline
#[derive(Debug, Default)]
pub struct ProcessingTimeProbeBuilder;

impl DurationProbeBuilder for ProcessingTimeProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: PROCESSING_TIME,
            display_name: "Processing Time",
            description: "The time it took to successfully process a message.",
        }
    }

    fn wire(&self, probe: Arc<DurationProbe>, events: &PipelineEvents) {
        events.receive_completed.subscribe(move |completed| {
            if !completed.succeeded {
                return;
            }
            if let Some(elapsed) = completed.processing_time() {
                probe.record(elapsed);
            }
        });
    }
}

/// Time from the sender dispatching a message until it was processed
///
/// Messages without a time-sent header are not recorded.
#[derive(Debug, Default)]
pub struct CriticalTimeProbeBuilder;

impl DurationProbeBuilder for CriticalTimeProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: CRITICAL_TIME,
            display_name: "Critical Time",
            description: "The time it took from sending to processing the message.",
        }
    }

    fn wire(&self, probe: Arc<DurationProbe>, events: &PipelineEvents) {
        events.receive_completed.subscribe(move |completed| {
            if !completed.succeeded {
                return;
            }
            if let Some(elapsed) = completed.critical_time() {
                probe.record(elapsed);
            }
        });
    }
}
