//! Busmetrics
//!
//! Endpoint metrics for a message bus: receive probes, queue length
//! instrumentation of outbound dispatch and scheduled metric reports.
//!
//! # Architecture
//!
//! ```text
//! PipelineEvents ──→ ProbeRegistry ──→ MetricsContext ←── ReportScheduler ──→ sinks
//!                     timers, meters        │              one task per report
//!                                           │
//! Pipeline::dispatch ──→ QueueLengthIntercept ──→ QueueLength ──→ QueueLengthRestore ──→ Transport
//!                        one copy per            stamps header,   originals back,
//!                        destination             counts sends     copies committed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use busmetrics::{MetricsFeature, MetricsOptions};
//! use busmetrics_pipeline::{InMemoryTransport, PipelineBuilder, PipelineEvents};
//!
//! let mut options = MetricsOptions::new();
//! options
//!     .set_endpoint_name("Sales")?
//!     .send_metric_data_to("Particular.Monitoring", Duration::from_secs(10))?;
//!
//! let events = PipelineEvents::new();
//! let mut builder = PipelineBuilder::new();
//! let mut feature = MetricsFeature::setup(options, &mut builder, &events)?;
//!
//! let transport = Arc::new(InMemoryTransport::new());
//! let pipeline = builder.build(transport.clone())?;
//! feature.start(transport)?;
//! // ... dispatch through `pipeline`, raise receive events on `events` ...
//! feature.stop().await;
//! ```

mod error;
mod feature;
mod logging;
mod options;
pub mod probes;
pub mod queue_length;

#[cfg(test)]
mod queue_length_test;

pub use error::{MetricsError, Result};
pub use feature::MetricsFeature;
pub use logging::init_logging;
pub use options::{MetricsOptions, ReportRegistration, ReportTarget};
pub use probes::{DurationProbe, ProbeDescriptor, ProbeRegistry, SignalProbe};
pub use queue_length::{
    DestinationResolver, QUEUE_LENGTH_HEADER, QueueLengthInstrumentation, SequenceCounter,
    StaticRoutes,
};
