//! Snapshot formatters
//!
//! Turn a [`MetricsSnapshot`] into the payload a sink delivers: the JSON
//! report document or a human-readable block for log output.

mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use busmetrics_config::MetricsFormat;

use crate::MetricsSnapshot;

/// Trait for snapshot formatters
pub trait MetricsFormatter: Send + Sync {
    /// Serialize a snapshot
    fn format(&self, snapshot: &MetricsSnapshot) -> String;
}

/// Build the formatter for a configured format
pub fn formatter_for(format: MetricsFormat) -> Box<dyn MetricsFormatter> {
    match format {
        MetricsFormat::Json => Box::new(JsonFormatter::new()),
        MetricsFormat::Human => Box::new(HumanFormatter::new()),
    }
}

/// Format count with K/M suffix for readability
pub fn format_count(count: u64) -> String {
    const K: u64 = 1000;
    const M: u64 = 1_000_000;

    if count >= M {
        format!("{:.1}M", count as f64 / M as f64)
    } else if count >= K {
        format!("{:.1}K", count as f64 / K as f64)
    } else {
        count.to_string()
    }
}

/// Format rate per second with K/M suffix
pub fn format_rate(rate: f64) -> String {
    const K: f64 = 1000.0;
    const M: f64 = 1_000_000.0;

    if rate >= M {
        format!("{:.1}M/s", rate / M)
    } else if rate >= K {
        format!("{:.1}K/s", rate / K)
    } else {
        format!("{:.1}/s", rate)
    }
}

/// Format a microsecond value as a short duration
pub fn format_micros(micros: f64) -> String {
    if micros >= 1_000_000.0 {
        format!("{:.2}s", micros / 1_000_000.0)
    } else if micros >= 1_000.0 {
        format!("{:.1}ms", micros / 1_000.0)
    } else {
        format!("{:.0}us", micros)
    }
}
