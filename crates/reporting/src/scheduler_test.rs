//! Report scheduler tests
//!
//! Timing-based: intervals are a few milliseconds and assertions leave room
//! for scheduling jitter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use busmetrics_metrics::{
    HumanFormatter, MetricsContext, REPORT_WINDOW_END, REPORT_WINDOW_START,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::sleep;

use crate::capture::Captured;
use crate::{ReportError, ReportScheduler, ReportSink, SinkError};

/// Records every payload it receives
#[derive(Default)]
struct Collecting {
    payloads: Mutex<Vec<String>>,
}

impl Collecting {
    fn payloads(&self) -> Vec<String> {
        self.payloads.lock().clone()
    }

    fn documents(&self) -> Vec<Value> {
        self.payloads()
            .iter()
            .map(|p| serde_json::from_str(p).unwrap())
            .collect()
    }
}

#[async_trait]
impl ReportSink for Collecting {
    fn kind(&self) -> &'static str {
        "collecting"
    }

    fn destination(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        self.payloads.lock().push(payload.to_string());
        Ok(())
    }
}

/// Fails every delivery
#[derive(Default)]
struct Failing {
    attempts: AtomicUsize,
}

#[async_trait]
impl ReportSink for Failing {
    fn kind(&self) -> &'static str {
        "failing"
    }

    fn destination(&self) -> &str {
        "NonExistentQueue"
    }

    async fn deliver(&self, _payload: &str) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Callback("unreachable".into()))
    }
}

/// Panics on its first delivery, succeeds afterwards
#[derive(Default)]
struct PanicsOnce {
    attempts: AtomicUsize,
}

#[async_trait]
impl ReportSink for PanicsOnce {
    fn kind(&self) -> &'static str {
        "panics"
    }

    fn destination(&self) -> &str {
        "Fragile"
    }

    async fn deliver(&self, _payload: &str) -> Result<(), SinkError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("report callback blew up");
        }
        Ok(())
    }
}

/// Takes `delay` to deliver
struct Slow {
    delay: Duration,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl Slow {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReportSink for Slow {
    fn kind(&self) -> &'static str {
        "slow"
    }

    fn destination(&self) -> &str {
        "slow"
    }

    async fn deliver(&self, _payload: &str) -> Result<(), SinkError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn meter_count(document: &Value, name: &str) -> u64 {
    document["Meters"]
        .as_array()
        .and_then(|meters| meters.iter().find(|m| m["Name"] == name))
        .and_then(|m| m["Count"].as_u64())
        .unwrap_or(0)
}

fn context() -> Arc<MetricsContext> {
    Arc::new(MetricsContext::new("Sales"))
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let mut scheduler = ReportScheduler::new(context());
    let err = scheduler
        .register("log", Arc::new(Collecting::default()), Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidInterval { ref name } if name == "log"));
    assert!(scheduler.is_empty());
}

#[tokio::test]
async fn test_duplicate_name_is_rejected() {
    let mut scheduler = ReportScheduler::new(context());
    let sink = Arc::new(Collecting::default());
    scheduler
        .register("log", sink.clone(), Duration::from_secs(1))
        .unwrap();
    let err = scheduler
        .register("log", sink, Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, ReportError::DuplicateReport(_)));
}

#[tokio::test]
async fn test_register_after_start_is_rejected() {
    let mut scheduler = ReportScheduler::new(context());
    scheduler.start().unwrap();
    assert!(scheduler.is_running());

    let err = scheduler
        .register("late", Arc::new(Collecting::default()), Duration::from_secs(1))
        .unwrap_err();
    assert!(matches!(err, ReportError::AlreadyStarted));
    assert!(matches!(scheduler.start(), Err(ReportError::AlreadyStarted)));

    scheduler.stop().await;
    assert!(!scheduler.is_running());
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_delivers_on_interval() {
    let context = context();
    context.counter("QueueLengthSend_Billing").increment();

    let sink = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(Arc::clone(&context));
    scheduler
        .register("memory", sink.clone(), Duration::from_millis(20))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(110)).await;
    scheduler.stop().await;

    let documents = sink.documents();
    assert!(documents.len() >= 3, "got {} reports", documents.len());
    for document in &documents {
        assert_eq!(document["Context"], "Sales");
        assert_eq!(document["Counters"][0]["Name"], "QueueLengthSend_Billing");
        assert_eq!(document["Counters"][0]["Count"], 1);
    }
}

#[tokio::test]
async fn test_windows_are_contiguous() {
    let sink = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(context());
    scheduler
        .register("memory", sink.clone(), Duration::from_millis(10))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(60)).await;
    scheduler.stop().await;

    let windows: Vec<(String, String)> = sink
        .documents()
        .iter()
        .map(|doc| {
            let env = doc["Environment"].as_array().unwrap();
            let find = |key: &str| {
                env.iter()
                    .find(|e| e["Name"] == key)
                    .and_then(|e| e["Value"].as_str())
                    .unwrap()
                    .to_string()
            };
            (find(REPORT_WINDOW_START), find(REPORT_WINDOW_END))
        })
        .collect();

    assert!(windows.len() >= 2);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
}

#[tokio::test]
async fn test_custom_formatter() {
    let sink = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(context());
    scheduler
        .register_with_formatter(
            "human",
            sink.clone(),
            Duration::from_millis(10),
            Arc::new(HumanFormatter::new()),
        )
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(35)).await;
    scheduler.stop().await;

    let payloads = sink.payloads();
    assert!(!payloads.is_empty());
    assert!(payloads[0].starts_with("[metrics:Sales] window:"));
}

#[tokio::test]
async fn test_failing_sink_does_not_affect_others() {
    let captured = Captured::default();
    let _guard = captured.set_default();

    let failing = Arc::new(Failing::default());
    let healthy = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(context());
    scheduler
        .register("failing", failing.clone(), Duration::from_millis(10))
        .unwrap();
    scheduler
        .register("healthy", healthy.clone(), Duration::from_millis(15))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    // The failing sink keeps being ticked after its first failure
    assert!(failing.attempts.load(Ordering::SeqCst) >= 3);
    assert!(healthy.payloads().len() >= 3);

    let errors = captured.errors();
    assert!(!errors.is_empty());
    assert!(
        errors
            .iter()
            .all(|e| e.message == "Error while sending metric data to NonExistentQueue")
    );
}

#[tokio::test]
async fn test_panicking_sink_keeps_ticking() {
    let captured = Captured::default();
    let _guard = captured.set_default();

    let fragile = Arc::new(PanicsOnce::default());
    let healthy = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(context());
    scheduler
        .register("fragile", fragile.clone(), Duration::from_millis(5))
        .unwrap();
    scheduler
        .register("healthy", healthy.clone(), Duration::from_millis(5))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert!(fragile.attempts.load(Ordering::SeqCst) >= 5);
    assert!(healthy.payloads().len() >= 5);
    let errors = captured.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Error while sending metric data to Fragile");
}

#[tokio::test]
async fn test_slow_delivery_times_out() {
    let captured = Captured::default();
    let _guard = captured.set_default();

    let slow = Arc::new(Slow::new(Duration::from_secs(60)));
    let mut scheduler = ReportScheduler::new(context())
        .with_delivery_timeout(Duration::from_millis(15));
    scheduler
        .register("slow", slow.clone(), Duration::from_millis(10))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(80)).await;
    scheduler.stop().await;

    assert!(slow.started.load(Ordering::SeqCst) >= 2);
    assert_eq!(slow.finished.load(Ordering::SeqCst), 0);
    assert!(
        captured
            .errors()
            .iter()
            .any(|e| e.message.starts_with("Error while sending metric data to slow"))
    );
}

#[tokio::test]
async fn test_stop_waits_for_in_flight_delivery() {
    let slow = Arc::new(Slow::new(Duration::from_millis(40)));
    let mut scheduler = ReportScheduler::new(context());
    scheduler
        .register("slow", slow.clone(), Duration::from_millis(10))
        .unwrap();
    scheduler.start().unwrap();

    // First tick fires at 10ms and is mid-delivery at 20ms
    sleep(Duration::from_millis(20)).await;
    scheduler.stop().await;

    let started = slow.started.load(Ordering::SeqCst);
    assert!(started >= 1);
    assert_eq!(slow.finished.load(Ordering::SeqCst), started);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(slow.started.load(Ordering::SeqCst), started);
}

#[tokio::test]
async fn test_stop_starts_no_tick_while_overdue() {
    // Delivery outlasts the interval, so a tick is always overdue when the
    // in-flight delivery returns
    for _ in 0..20 {
        let slow = Arc::new(Slow::new(Duration::from_millis(15)));
        let mut scheduler = ReportScheduler::new(context());
        scheduler
            .register("slow", slow.clone(), Duration::from_millis(2))
            .unwrap();
        scheduler.start().unwrap();

        sleep(Duration::from_millis(10)).await;
        let started = slow.started.load(Ordering::SeqCst);
        scheduler.stop().await;

        assert_eq!(slow.started.load(Ordering::SeqCst), started);
        assert_eq!(slow.finished.load(Ordering::SeqCst), started);
    }
}

#[tokio::test]
async fn test_stop_gives_in_flight_delivery_its_timeout() {
    let captured = Captured::default();
    let _guard = captured.set_default();

    let slow = Arc::new(Slow::new(Duration::from_millis(60)));
    let mut scheduler = ReportScheduler::new(context())
        .with_delivery_timeout(Duration::from_millis(200))
        .with_shutdown_timeout(Duration::from_millis(5));
    scheduler
        .register("slow", slow.clone(), Duration::from_millis(5))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(15)).await;
    scheduler.stop().await;

    // Shorter shutdown bound does not cut the delivery short
    assert_eq!(slow.started.load(Ordering::SeqCst), 1);
    assert_eq!(slow.finished.load(Ordering::SeqCst), 1);
    assert!(captured.errors().is_empty());
}

#[tokio::test]
async fn test_stop_abandons_delivery_after_delivery_timeout() {
    let slow = Arc::new(Slow::new(Duration::from_secs(60)));
    let mut scheduler = ReportScheduler::new(context())
        .with_delivery_timeout(Duration::from_millis(30))
        .with_shutdown_timeout(Duration::from_millis(20));
    scheduler
        .register("slow", slow.clone(), Duration::from_millis(5))
        .unwrap();
    scheduler.start().unwrap();

    sleep(Duration::from_millis(15)).await;
    let stopped = tokio::time::timeout(Duration::from_secs(1), scheduler.stop()).await;

    assert!(stopped.is_ok());
    assert_eq!(slow.finished.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Shared resets
// ============================================================================

#[tokio::test]
async fn test_sinks_share_meter_resets() {
    let context = context();
    let meter = context.meter("nservicebus_fetched_total");

    let fast = Arc::new(Collecting::default());
    let slow = Arc::new(Collecting::default());
    let mut scheduler = ReportScheduler::new(Arc::clone(&context));
    scheduler
        .register("fast", fast.clone(), Duration::from_millis(5))
        .unwrap();
    scheduler
        .register("slow", slow.clone(), Duration::from_millis(50))
        .unwrap();
    scheduler.start().unwrap();

    let mut marked = 0u64;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
    while tokio::time::Instant::now() < deadline {
        meter.mark();
        marked += 1;
        sleep(Duration::from_millis(1)).await;
    }
    scheduler.stop().await;

    let name = "nservicebus_fetched_total";
    let fast_total: u64 = fast.documents().iter().map(|d| meter_count(d, name)).sum();
    let slow_total: u64 = slow.documents().iter().map(|d| meter_count(d, name)).sum();

    // Re-reading right now finds only what no sink has consumed yet
    let now = chrono::Utc::now();
    let remainder = context.snapshot(now, now).meter(name).map_or(0, |m| m.count);

    // Every mark is reported exactly once across all readers
    assert_eq!(fast_total + slow_total + remainder, marked);
    // The frequent sink consumes most of the activity
    assert!(fast_total > slow_total, "fast {fast_total}, slow {slow_total}");
    assert!(fast_total * 4 >= marked * 3, "fast {fast_total} of {marked}");
    // Each slow report only sees what arrived since the last fast tick
    for document in slow.documents() {
        let count = meter_count(&document, name);
        assert!(count * 4 < marked, "slow report saw {count} of {marked}");
    }
    assert!(remainder * 4 < marked, "remainder {remainder} of {marked}");
}
