//! Signal probe builders

use std::sync::Arc;

use busmetrics_pipeline::PipelineEvents;

use super::{FAILURE, FETCHED, ProbeDescriptor, RETRIES, SUCCESS, SignalProbe, SignalProbeBuilder};

#[derive(Debug, Default)]
pub struct MessagePulledFromQueueProbeBuilder;

impl SignalProbeBuilder for MessagePulledFromQueueProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: FETCHED,
            display_name: "# of msgs pulled from the input queue /sec",
            description: "The current number of messages pulled from the input queue by the transport per second.",
        }
    }

    fn wire(&self, probe: Arc<SignalProbe>, events: &PipelineEvents) {
        events.message_pulled.subscribe(move |_| probe.signal());
    }
}

#[derive(Debug, Default)]
pub struct MessageProcessingSuccessProbeBuilder;

impl SignalProbeBuilder for MessageProcessingSuccessProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: SUCCESS,
            display_name: "# of msgs successfully processed / sec",
            description: "The current number of messages processed successfully by the transport per second.",
        }
    }

    fn wire(&self, probe: Arc<SignalProbe>, events: &PipelineEvents) {
        events.processing_succeeded.subscribe(move |_| probe.signal());
    }
}

#[derive(Debug, Default)]
pub struct MessageProcessingFailureProbeBuilder;

impl SignalProbeBuilder for MessageProcessingFailureProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: FAILURE,
            display_name: "# of msgs failures / sec",
            description: "The current number of failed processed messages by the transport per second.",
        }
    }

    fn wire(&self, probe: Arc<SignalProbe>, events: &PipelineEvents) {
        events.processing_failed.subscribe(move |_| probe.signal());
    }
}

/// Fires for immediate and delayed retries alike
#[derive(Debug, Default)]
pub struct RetriesProbeBuilder;

impl SignalProbeBuilder for RetriesProbeBuilder {
    fn descriptor(&self) -> ProbeDescriptor {
        ProbeDescriptor {
            id: RETRIES,
            display_name: "Retries",
            description: "A message has been scheduled for retry (FLR or SLR)",
        }
    }

    fn wire(&self, probe: Arc<SignalProbe>, events: &PipelineEvents) {
        events.retry_scheduled.subscribe(move |_| probe.signal());
    }
}
