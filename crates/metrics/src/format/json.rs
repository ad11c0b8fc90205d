//! JSON report formatter
//!
//! Produces the report payload consumed by monitoring endpoints. Keys are
//! PascalCase; consumers look up counters by `Name`, e.g. every counter
//! starting with `QueueLengthSend_`.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "Context": "Sales",
//!   "Timestamp": "2024-01-31T12:00:05.251Z",
//!   "Environment": [
//!     { "Name": "ReportWindowStart", "Value": "2024-01-31T12:00:00.000Z" },
//!     { "Name": "ReportWindowEnd", "Value": "2024-01-31T12:00:05.250Z" }
//!   ],
//!   "Counters": [
//!     { "Name": "QueueLengthSend_Billing_6a1f..", "Count": 2, "Unit": "", "Tags": [] }
//!   ],
//!   "Meters": [ .. ],
//!   "Timers": [ .. ]
//! }
//! ```

use serde::Serialize;
use tracing::warn;

use super::MetricsFormatter;
use crate::snapshot::format_timestamp;
use crate::{
    EnvironmentEntry, HistogramValue, MetricIdentity, MetricSample, MetricsSnapshot, TimerValue,
};

/// JSON report formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter (compact output)
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output
    #[must_use]
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SnapshotJson<'a> {
    context: &'a str,
    timestamp: String,
    environment: Vec<EnvironmentJson<'a>>,
    gauges: Vec<GaugeJson<'a>>,
    counters: Vec<CounterJson<'a>>,
    meters: Vec<MeterJson<'a>>,
    histograms: Vec<HistogramJson<'a>>,
    timers: Vec<TimerJson<'a>>,
    child_metrics: Vec<SnapshotJson<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvironmentJson<'a> {
    name: &'a str,
    value: &'a str,
}

/// Fields every metric entry carries
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityJson<'a> {
    name: &'a str,
    unit: &'a str,
    tags: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GaugeJson<'a> {
    #[serde(flatten)]
    identity: IdentityJson<'a>,
    value: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CounterJson<'a> {
    #[serde(flatten)]
    identity: IdentityJson<'a>,
    count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MeterJson<'a> {
    #[serde(flatten)]
    identity: IdentityJson<'a>,
    count: u64,
    mean_rate: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HistogramFields {
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
    mean: f64,
    median: u64,
    percentile75: u64,
    percentile95: u64,
    percentile99: u64,
}

impl From<&HistogramValue> for HistogramFields {
    fn from(h: &HistogramValue) -> Self {
        Self {
            count: h.count,
            sum: h.sum,
            min: h.min,
            max: h.max,
            mean: h.mean,
            median: h.median,
            percentile75: h.p75,
            percentile95: h.p95,
            percentile99: h.p99,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct HistogramJson<'a> {
    #[serde(flatten)]
    identity: IdentityJson<'a>,
    #[serde(flatten)]
    histogram: HistogramFields,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TimerJson<'a> {
    #[serde(flatten)]
    identity: IdentityJson<'a>,
    count: u64,
    mean_rate: f64,
    histogram: HistogramFields,
}

fn identity(id: &MetricIdentity) -> IdentityJson<'_> {
    IdentityJson {
        name: id.name(),
        unit: id.unit(),
        tags: id.tags().iter().map(String::as_str).collect(),
    }
}

fn entries<'a, V, T>(samples: &'a [MetricSample<V>], f: impl Fn(&'a MetricSample<V>) -> T) -> Vec<T> {
    samples.iter().map(f).collect()
}

fn environment(entries: &[EnvironmentEntry]) -> Vec<EnvironmentJson<'_>> {
    entries
        .iter()
        .map(|e| EnvironmentJson {
            name: &e.name,
            value: &e.value,
        })
        .collect()
}

fn timer(sample: &MetricSample<TimerValue>) -> TimerJson<'_> {
    TimerJson {
        identity: identity(&sample.identity),
        count: sample.value.rate.count,
        mean_rate: sample.value.rate.mean_rate,
        histogram: HistogramFields::from(&sample.value.histogram),
    }
}

fn snapshot_json(snapshot: &MetricsSnapshot) -> SnapshotJson<'_> {
    SnapshotJson {
        context: snapshot.context(),
        timestamp: format_timestamp(&snapshot.captured_at()),
        environment: environment(snapshot.environment()),
        gauges: entries(snapshot.gauges(), |s| GaugeJson {
            identity: identity(&s.identity),
            value: s.value,
        }),
        counters: entries(snapshot.counters(), |s| CounterJson {
            identity: identity(&s.identity),
            count: s.value.count,
        }),
        meters: entries(snapshot.meters(), |s| MeterJson {
            identity: identity(&s.identity),
            count: s.value.count,
            mean_rate: s.value.mean_rate,
        }),
        histograms: entries(snapshot.histograms(), |s| HistogramJson {
            identity: identity(&s.identity),
            histogram: HistogramFields::from(&s.value),
        }),
        timers: entries(snapshot.timers(), timer),
        child_metrics: snapshot.children().iter().map(snapshot_json).collect(),
    }
}

impl MetricsFormatter for JsonFormatter {
    fn format(&self, snapshot: &MetricsSnapshot) -> String {
        let json = snapshot_json(snapshot);
        let result = if self.pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        result.unwrap_or_else(|e| {
            warn!(context = snapshot.context(), error = %e, "failed to serialize metrics snapshot");
            "{}".to_string()
        })
    }
}
