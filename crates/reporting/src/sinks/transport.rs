//! Transport sink: sends each report as a message to a monitoring queue

use std::sync::Arc;

use async_trait::async_trait;
use busmetrics_pipeline::{DispatchOperation, Transport, headers};
use chrono::Utc;
use tracing::trace;

use super::ReportSink;
use crate::error::SinkError;

/// Header identifying the reporting host
pub const ORIGINATING_HOST_ID: &str = "NServiceBus.Metric.OriginatingHostId";

/// Message type of report messages
pub const METRIC_REPORT_TYPE: &str = "NServiceBus.Metrics.MetricReport";

const APPLICATION_JSON: &str = "application/json";

/// Sends report payloads to a destination queue
pub struct TransportSink {
    destination: String,
    transport: Arc<dyn Transport>,
    endpoint: String,
    host_id: String,
}

impl TransportSink {
    pub fn new(
        destination: impl Into<String>,
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        host_id: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            transport,
            endpoint: endpoint.into(),
            host_id: host_id.into(),
        }
    }

    fn message(&self, payload: &str) -> DispatchOperation {
        DispatchOperation::unicast(&*self.destination, payload.as_bytes().to_vec())
            .with_header(ORIGINATING_HOST_ID, &*self.host_id)
            .with_header(headers::ORIGINATING_ENDPOINT, &*self.endpoint)
            .with_header(headers::ENCLOSED_MESSAGE_TYPES, METRIC_REPORT_TYPE)
            .with_header(headers::CONTENT_TYPE, APPLICATION_JSON)
            .with_header(headers::TIME_SENT, headers::to_wire_time(&Utc::now()))
    }
}

impl std::fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSink")
            .field("destination", &self.destination)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ReportSink for TransportSink {
    fn kind(&self) -> &'static str {
        "transport"
    }

    fn destination(&self) -> &str {
        &self.destination
    }

    async fn deliver(&self, payload: &str) -> Result<(), SinkError> {
        let message = self.message(payload);
        self.transport
            .dispatch(std::slice::from_ref(&message))
            .await
            .map_err(|source| SinkError::Dispatch {
                destination: self.destination.clone(),
                source,
            })?;
        trace!(destination = %self.destination, bytes = payload.len(), "metric report sent");
        Ok(())
    }
}
