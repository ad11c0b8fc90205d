//! Human-readable snapshot formatter
//!
//! Compact per-category lines for log output.
//!
//! # Example Output
//!
//! ```text
//! [metrics:Sales] window: 2024-01-31T12:00:00.000Z .. 2024-01-31T12:00:05.250Z
//! [metrics:Sales] counters: QueueLengthSend_Billing_6a1f.. 2
//! [metrics:Sales] meters: nservicebus_fetched_total 12 (2.4/s) | nservicebus_success_total 12 (2.4/s)
//! [metrics:Sales] timers: nservicebus_processingtime_seconds 12 (mean 1.2ms, p99 3.1ms)
//! ```

use std::fmt::Write;

use super::{MetricsFormatter, format_count, format_micros, format_rate};
use crate::{MetricSample, MetricsSnapshot, REPORT_WINDOW_END, REPORT_WINDOW_START};

/// Human-readable snapshot formatter
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    /// Create a new human formatter
    pub fn new() -> Self {
        Self
    }

    fn format_into(&self, snapshot: &MetricsSnapshot, path: &str, output: &mut String) {
        let prefix = format!("[metrics:{path}]");

        let _ = write!(
            output,
            "{prefix} window: {} .. {}",
            snapshot.environment_value(REPORT_WINDOW_START).unwrap_or("-"),
            snapshot.environment_value(REPORT_WINDOW_END).unwrap_or("-"),
        );

        line(output, &prefix, "gauges", snapshot.gauges(), |s| {
            format!("{} {}", s.name(), s.value)
        });
        line(output, &prefix, "counters", snapshot.counters(), |s| {
            format!("{} {}", s.name(), s.value.count)
        });
        line(output, &prefix, "meters", snapshot.meters(), |s| {
            format!(
                "{} {} ({})",
                s.name(),
                format_count(s.value.count),
                format_rate(s.value.mean_rate)
            )
        });
        line(output, &prefix, "histograms", snapshot.histograms(), |s| {
            format!(
                "{} {} (mean {:.1}, p99 {})",
                s.name(),
                format_count(s.value.count),
                s.value.mean,
                s.value.p99
            )
        });
        line(output, &prefix, "timers", snapshot.timers(), |s| {
            format!(
                "{} {} (mean {}, p99 {})",
                s.name(),
                format_count(s.value.histogram.count),
                format_micros(s.value.histogram.mean),
                format_micros(s.value.histogram.p99 as f64)
            )
        });

        for child in snapshot.children() {
            output.push('\n');
            self.format_into(child, &format!("{path}/{}", child.context()), output);
        }
    }
}

/// Append one category line; empty categories are omitted
fn line<V>(
    output: &mut String,
    prefix: &str,
    label: &str,
    samples: &[MetricSample<V>],
    entry: impl Fn(&MetricSample<V>) -> String,
) {
    if samples.is_empty() {
        return;
    }

    let _ = write!(output, "\n{prefix} {label}:");
    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            output.push_str(" |");
        }
        output.push(' ');
        output.push_str(&entry(sample));
    }
}

impl MetricsFormatter for HumanFormatter {
    fn format(&self, snapshot: &MetricsSnapshot) -> String {
        let mut output = String::new();
        self.format_into(snapshot, snapshot.context(), &mut output);
        output
    }
}
