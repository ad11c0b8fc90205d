//! Trace sink: writes each payload as a TRACE event under its own target

use async_trait::async_trait;
use tracing::trace;

use super::ReportSink;
use crate::error::SinkError;

/// Target of report lines written by [`TraceSink`]
pub const TRACE_TARGET: &str = "busmetrics::trace";

/// Writes payloads at TRACE level, so they can be enabled independently of
/// the rest of the process logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceSink;

impl TraceSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSink for TraceSink {
    fn kind(&self) -> &'static str {
        "trace"
    }

    fn destination(&self) -> &str {
        TRACE_TARGET
    }

    async fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        trace!(target: TRACE_TARGET, "{payload}");
        Ok(())
    }
}
