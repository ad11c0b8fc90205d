//! Log sink: writes each payload through `tracing`

use async_trait::async_trait;
use busmetrics_config::LogLevel;
use tracing::{debug, error, info, trace, warn};

use super::ReportSink;
use crate::error::SinkError;

/// Target of report lines written by [`LogSink`]
pub const REPORT_TARGET: &str = "busmetrics::report";

/// Writes payloads as log lines at a fixed level
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    level: LogLevel,
}

impl LogSink {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.level
    }
}

#[async_trait]
impl ReportSink for LogSink {
    fn kind(&self) -> &'static str {
        "log"
    }

    fn destination(&self) -> &str {
        REPORT_TARGET
    }

    async fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        match self.level {
            LogLevel::Trace => trace!(target: REPORT_TARGET, "{payload}"),
            LogLevel::Debug => debug!(target: REPORT_TARGET, "{payload}"),
            LogLevel::Info => info!(target: REPORT_TARGET, "{payload}"),
            LogLevel::Warn => warn!(target: REPORT_TARGET, "{payload}"),
            LogLevel::Error => error!(target: REPORT_TARGET, "{payload}"),
        }
        Ok(())
    }
}
