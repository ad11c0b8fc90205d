//! Report sinks
//!
//! A sink receives one serialized snapshot per tick of its schedule.
//!
//! | Sink | Destination | Payload |
//! |------|-------------|---------|
//! | `TransportSink` | a queue, via the transport | JSON report message |
//! | `LogSink` | `tracing` at a configured level | any formatter |
//! | `TraceSink` | `tracing` TRACE, target `busmetrics::trace` | any formatter |
//! | `CustomSink` | a user callback | any formatter |

mod custom;
mod log;
mod trace;
mod transport;

pub use custom::CustomSink;
pub use log::{LogSink, REPORT_TARGET};
pub use trace::{TRACE_TARGET, TraceSink};
pub use transport::{METRIC_REPORT_TYPE, ORIGINATING_HOST_ID, TransportSink};

use async_trait::async_trait;

use crate::error::SinkError;

/// Consumer of serialized snapshots
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Kind of sink, for logging (`transport`, `log`, ..)
    fn kind(&self) -> &'static str;

    /// Where payloads go, for logging
    fn destination(&self) -> &str;

    /// Deliver one payload
    async fn deliver(&self, payload: &str) -> Result<(), SinkError>;
}
