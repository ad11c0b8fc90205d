//! Queue length pipeline stages
//!
//! ```text
//! QueueLengthIntercept   one copy of each operation per destination,
//!        │               substituted for the originals
//!        ▼
//! QueueLength            stamps `{sessionId}_{sequence}` on every copy
//!        │
//!        ▼
//! QueueLengthRestore     restores the originals, commits the stamped copies
//!        │
//!        ▼
//! later stages see the original operations; the transport sends the copies
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use busmetrics_metrics::MetricsContext;
use busmetrics_pipeline::{DispatchContext, Next, Result, Stage, SubstitutionScope};
use tracing::trace;

use super::{
    DestinationResolver, INTERCEPT_STAGE, QUEUE_LENGTH_HEADER, RESTORE_STAGE, SEND_COUNTER_PREFIX,
    STAMP_STAGE, SequenceCounter, stream_key,
};

/// Duplicates each operation once per resolved destination
pub struct QueueLengthIntercept {
    resolver: Arc<dyn DestinationResolver>,
}

impl QueueLengthIntercept {
    pub fn new(resolver: Arc<dyn DestinationResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Stage for QueueLengthIntercept {
    fn name(&self) -> &str {
        INTERCEPT_STAGE
    }

    async fn invoke(&self, ctx: &mut DispatchContext, next: Next<'_>) -> Result<()> {
        let duplicated: Vec<_> = ctx
            .operations()
            .iter()
            .flat_map(|op| {
                self.resolver
                    .destinations(op)
                    .into_iter()
                    .map(move |destination| op.duplicate_for(destination))
            })
            .collect();

        trace!(
            operations = ctx.operations().len(),
            duplicated = duplicated.len(),
            "dispatch duplicated per destination"
        );

        let mut scope = SubstitutionScope::enter(ctx, duplicated);
        next.run(&mut scope).await
    }
}

/// Stamps the queue length header on every unicast operation
pub struct QueueLengthStamp {
    sequences: Arc<SequenceCounter>,
    context: Arc<MetricsContext>,
}

impl QueueLengthStamp {
    pub fn new(sequences: Arc<SequenceCounter>, context: Arc<MetricsContext>) -> Self {
        Self { sequences, context }
    }
}

#[async_trait]
impl Stage for QueueLengthStamp {
    fn name(&self) -> &str {
        STAMP_STAGE
    }

    async fn invoke(&self, ctx: &mut DispatchContext, next: Next<'_>) -> Result<()> {
        let session_id = self.sequences.session_id();
        for op in ctx.operations_mut() {
            // Unresolved multicast operations have no queue to count
            let Some(key) = stream_key(op) else {
                continue;
            };
            let sequence = self.sequences.next(&key);
            op.set_header(QUEUE_LENGTH_HEADER, format!("{session_id}_{sequence}"));
            self.context
                .counter(format!("{SEND_COUNTER_PREFIX}{key}_{session_id}"))
                .increment();
            trace!(stream = %key, sequence, "queue length stamped");
        }
        next.run(ctx).await
    }
}

/// Puts the original operations back and commits the stamped copies
#[derive(Debug, Default)]
pub struct QueueLengthRestore;

#[async_trait]
impl Stage for QueueLengthRestore {
    fn name(&self) -> &str {
        RESTORE_STAGE
    }

    async fn invoke(&self, ctx: &mut DispatchContext, next: Next<'_>) -> Result<()> {
        if let Some(stamped) = ctx.restore_original() {
            ctx.commit(stamped);
        }
        next.run(ctx).await
    }
}
