//! Queue length stage tests

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use busmetrics_metrics::MetricsContext;
use busmetrics_pipeline::{
    DispatchContext, DispatchOperation, InMemoryTransport, Next, Pipeline, PipelineBuilder,
    PipelineError, Stage, headers,
};
use chrono::Utc;
use parking_lot::Mutex;

use crate::queue_length::{
    QUEUE_LENGTH_HEADER, QueueLengthInstrumentation, RESTORE_STAGE, SEND_COUNTER_PREFIX,
    STAMP_STAGE, SequenceCounter, StaticRoutes, parse_header,
};

/// Records the operations visible at its position in the chain
struct Observe {
    name: &'static str,
    seen: Arc<Mutex<Vec<Vec<DispatchOperation>>>>,
}

#[async_trait]
impl Stage for Observe {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, ctx: &mut DispatchContext, next: Next<'_>) -> busmetrics_pipeline::Result<()> {
        self.seen.lock().push(ctx.operations().to_vec());
        next.run(ctx).await
    }
}

/// Fails every dispatch after recording what it saw
struct FailAfterStamp {
    substituted: Arc<Mutex<Vec<bool>>>,
}

#[async_trait]
impl Stage for FailAfterStamp {
    fn name(&self) -> &str {
        "FailAfterStamp"
    }

    async fn invoke(&self, ctx: &mut DispatchContext, _next: Next<'_>) -> busmetrics_pipeline::Result<()> {
        self.substituted.lock().push(ctx.is_substituted());
        Err(PipelineError::stage("FailAfterStamp", "boom"))
    }
}

struct Harness {
    pipeline: Pipeline,
    transport: Arc<InMemoryTransport>,
    context: Arc<MetricsContext>,
    instrumentation: QueueLengthInstrumentation,
    after_restore: Arc<Mutex<Vec<Vec<DispatchOperation>>>>,
}

fn routes() -> StaticRoutes {
    StaticRoutes::new()
        .with_route("Sales.OrderPlaced", ["Billing", "Shipping", "Audit"])
        .with_route("Sales.OrderCancelled", ["Billing"])
}

fn harness(routes: StaticRoutes) -> Harness {
    let context = Arc::new(MetricsContext::new("Sales"));
    let instrumentation = QueueLengthInstrumentation::with_sequences(
        Arc::new(SequenceCounter::with_session_id("8c1f6a2e-session")),
        Arc::new(routes),
        Arc::clone(&context),
    );
    let after_restore = Arc::new(Mutex::new(Vec::new()));

    let mut builder = PipelineBuilder::new();
    instrumentation.install(&mut builder);
    builder.register_after(
        RESTORE_STAGE,
        Observe {
            name: "AfterRestore",
            seen: Arc::clone(&after_restore),
        },
    );

    let transport = Arc::new(InMemoryTransport::new());
    let pipeline = builder.build(transport.clone()).unwrap();
    Harness {
        pipeline,
        transport,
        context,
        instrumentation,
        after_restore,
    }
}

fn sequence(op: &DispatchOperation) -> u64 {
    let header = op.header(QUEUE_LENGTH_HEADER).unwrap();
    let (session_id, sequence) = parse_header(header).unwrap();
    assert_eq!(session_id, "8c1f6a2e-session");
    sequence
}

fn send_counter(context: &MetricsContext, stream: &str) -> Option<i64> {
    let now = Utc::now();
    context
        .snapshot(now, now)
        .counter(&format!("{SEND_COUNTER_PREFIX}{stream}_8c1f6a2e-session"))
        .map(|c| c.count)
}

#[tokio::test]
async fn test_unicast_sequences_are_contiguous() {
    let h = harness(routes());

    for _ in 0..5 {
        h.pipeline
            .dispatch(vec![DispatchOperation::unicast("Billing", b"{}".to_vec())])
            .await
            .unwrap();
    }
    h.pipeline
        .dispatch(vec![DispatchOperation::unicast("Shipping", b"{}".to_vec())])
        .await
        .unwrap();

    let billing: Vec<u64> = h.transport.sent_to("Billing").iter().map(sequence).collect();
    assert_eq!(billing, vec![1, 2, 3, 4, 5]);
    let shipping: Vec<u64> = h.transport.sent_to("Shipping").iter().map(sequence).collect();
    assert_eq!(shipping, vec![1]);

    assert_eq!(send_counter(&h.context, "Billing"), Some(5));
    assert_eq!(send_counter(&h.context, "Shipping"), Some(1));
}

#[tokio::test]
async fn test_typed_sends_share_the_destination_sequence() {
    let h = harness(routes());

    for message_type in ["Sales.PlaceOrder", "Sales.CancelOrder", "Sales.PlaceOrder"] {
        let send = DispatchOperation::unicast("Billing", b"{}".to_vec())
            .with_header(headers::ENCLOSED_MESSAGE_TYPES, message_type);
        h.pipeline.dispatch(vec![send]).await.unwrap();
    }

    let billing: Vec<u64> = h.transport.sent_to("Billing").iter().map(sequence).collect();
    assert_eq!(billing, vec![1, 2, 3]);
    assert_eq!(send_counter(&h.context, "Billing"), Some(3));
    assert_eq!(h.instrumentation.sequences().len(), 1);
}

#[tokio::test]
async fn test_multicast_is_duplicated_per_destination() {
    let h = harness(routes());
    let original = DispatchOperation::multicast("Sales.OrderPlaced", b"{\"Id\":1}".to_vec())
        .with_header("Custom", "value");

    h.pipeline.dispatch(vec![original.clone()]).await.unwrap();

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 3);
    let destinations: Vec<_> = sent.iter().filter_map(|op| op.destination()).collect();
    assert_eq!(destinations, vec!["Billing", "Shipping", "Audit"]);
    for op in &sent {
        assert_eq!(sequence(op), 1);
        assert_eq!(op.body, original.body);
        assert_eq!(op.message_id, original.message_id);
        assert_eq!(op.header("Custom"), Some("value"));
    }

    // Later stages see the original, unstamped operation
    let after_restore = h.after_restore.lock().clone();
    assert_eq!(after_restore, vec![vec![original]]);
}

#[tokio::test]
async fn test_event_types_are_sequenced_independently() {
    let h = harness(routes());

    for message_type in ["Sales.OrderPlaced", "Sales.OrderPlaced", "Sales.OrderCancelled"] {
        h.pipeline
            .dispatch(vec![DispatchOperation::multicast(message_type, Vec::new())])
            .await
            .unwrap();
    }

    let billing = h.transport.sent_to("Billing");
    let by_type: BTreeMap<&str, Vec<u64>> =
        billing.iter().fold(BTreeMap::new(), |mut acc, op| {
            acc.entry(op.message_type().unwrap())
                .or_default()
                .push(sequence(op));
            acc
        });
    assert_eq!(by_type["Sales.OrderPlaced"], vec![1, 2]);
    assert_eq!(by_type["Sales.OrderCancelled"], vec![1]);

    assert_eq!(
        send_counter(&h.context, "Billing/Sales.OrderPlaced"),
        Some(2)
    );
    assert_eq!(
        send_counter(&h.context, "Audit/Sales.OrderPlaced"),
        Some(2)
    );
}

#[tokio::test]
async fn test_no_destinations_sends_nothing() {
    let h = harness(routes());

    h.pipeline
        .dispatch(vec![DispatchOperation::multicast("Sales.Unrouted", Vec::new())])
        .await
        .unwrap();

    assert!(h.transport.sent().is_empty());
    assert!(h.instrumentation.sequences().is_empty());
    assert_eq!(h.after_restore.lock().len(), 1);
}

#[tokio::test]
async fn test_failure_after_stamp_restores_original() {
    let context = Arc::new(MetricsContext::new("Sales"));
    let instrumentation =
        QueueLengthInstrumentation::new(Arc::new(routes()), Arc::clone(&context));
    let substituted = Arc::new(Mutex::new(Vec::new()));

    let mut builder = PipelineBuilder::new();
    instrumentation.install(&mut builder);
    builder.register_before(
        RESTORE_STAGE,
        FailAfterStamp {
            substituted: Arc::clone(&substituted),
        },
    );
    let transport = Arc::new(InMemoryTransport::new());
    let pipeline = builder.build(transport.clone()).unwrap();
    assert_eq!(pipeline.stage_names()[1], STAMP_STAGE);

    let original = DispatchOperation::multicast("Sales.OrderPlaced", Vec::new());
    let mut ctx = DispatchContext::new(vec![original.clone()]);
    let err = pipeline.dispatch_context(&mut ctx).await.unwrap_err();

    assert!(matches!(err, PipelineError::Stage { .. }));
    assert_eq!(*substituted.lock(), vec![true]);
    assert!(!ctx.is_substituted());
    assert_eq!(ctx.operations(), &[original]);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_concurrent_dispatch_has_no_gaps() {
    let h = harness(routes());
    let pipeline = h.pipeline.clone();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    pipeline
                        .dispatch(vec![DispatchOperation::unicast("Billing", Vec::new())])
                        .await
                        .unwrap();
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let mut sequences: Vec<u64> = h.transport.sent_to("Billing").iter().map(sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=200).collect::<Vec<_>>());
}
