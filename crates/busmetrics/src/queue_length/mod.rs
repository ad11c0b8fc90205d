//! Queue length instrumentation
//!
//! Every outbound send carries `NServiceBus.Metrics.QueueLength =
//! {sessionId}_{sequence}`. The session id is fixed per process and the
//! sequence increases by exactly one per send on each stream, so a receiver
//! comparing the last sequence it saw with the last one sent can infer how
//! many messages are still queued.
//!
//! A stream is a destination address. Sends fanned out from a publish are
//! narrowed by the published message type, so two event types published to
//! the same subscriber are counted independently. Plain sends to a queue
//! share one stream whatever message they carry.
//!
//! Each stamp also increments the counter
//! `QueueLengthSend_{stream}_{sessionId}` in the metrics context, so reports
//! carry the send totals the receiving side is compared against.

mod resolver;
mod sequence;
mod stages;

use std::sync::Arc;

use busmetrics_metrics::MetricsContext;
use busmetrics_pipeline::{DispatchOperation, PipelineBuilder};

pub use resolver::{DestinationResolver, StaticRoutes};
pub use sequence::SequenceCounter;
pub use stages::{QueueLengthIntercept, QueueLengthRestore, QueueLengthStamp};

/// Header carrying `{sessionId}_{sequence}`
pub const QUEUE_LENGTH_HEADER: &str = "NServiceBus.Metrics.QueueLength";

/// Prefix of the per-stream send counters
pub const SEND_COUNTER_PREFIX: &str = "QueueLengthSend_";

/// Anchor stage that stamps the header
pub const STAMP_STAGE: &str = "QueueLength";

/// Stage placed before the anchor
pub const INTERCEPT_STAGE: &str = "QueueLengthIntercept";

/// Stage placed after the anchor
pub const RESTORE_STAGE: &str = "QueueLengthRestore";

/// Sequence stream of a unicast operation: `{destination}`, or
/// `{destination}/{message type}` for a copy of a publish
pub fn stream_key(operation: &DispatchOperation) -> Option<String> {
    let destination = operation.destination()?;
    Some(match operation.published_as.as_deref() {
        Some(message_type) => format!("{destination}/{message_type}"),
        None => destination.to_string(),
    })
}

/// Split a header value into session id and sequence
pub fn parse_header(value: &str) -> Option<(&str, u64)> {
    let (session_id, sequence) = value.rsplit_once('_')?;
    if session_id.is_empty() {
        return None;
    }
    Some((session_id, sequence.parse().ok()?))
}

/// The three queue length stages sharing one sequence counter
#[derive(Clone)]
pub struct QueueLengthInstrumentation {
    sequences: Arc<SequenceCounter>,
    resolver: Arc<dyn DestinationResolver>,
    context: Arc<MetricsContext>,
}

impl QueueLengthInstrumentation {
    pub fn new(resolver: Arc<dyn DestinationResolver>, context: Arc<MetricsContext>) -> Self {
        Self::with_sequences(Arc::new(SequenceCounter::new()), resolver, context)
    }

    pub fn with_sequences(
        sequences: Arc<SequenceCounter>,
        resolver: Arc<dyn DestinationResolver>,
        context: Arc<MetricsContext>,
    ) -> Self {
        Self {
            sequences,
            resolver,
            context,
        }
    }

    pub fn session_id(&self) -> &str {
        self.sequences.session_id()
    }

    pub fn sequences(&self) -> &Arc<SequenceCounter> {
        &self.sequences
    }

    /// Register the anchor and the stages around it
    pub fn install(&self, builder: &mut PipelineBuilder) {
        builder
            .register(QueueLengthStamp::new(
                Arc::clone(&self.sequences),
                Arc::clone(&self.context),
            ))
            .register_before(
                STAMP_STAGE,
                QueueLengthIntercept::new(Arc::clone(&self.resolver)),
            )
            .register_after(STAMP_STAGE, QueueLengthRestore);
    }
}

impl std::fmt::Debug for QueueLengthInstrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueLengthInstrumentation")
            .field("session_id", &self.session_id())
            .field("streams", &self.sequences.len())
            .finish_non_exhaustive()
    }
}
