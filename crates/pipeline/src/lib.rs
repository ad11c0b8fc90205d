//! Busmetrics - Pipeline
//!
//! The messaging pipeline boundary the metrics feature plugs into.
//!
//! # Architecture
//!
//! ```text
//! Pipeline::dispatch(ops)
//!     │
//!     ▼
//! [Stage] ──→ [Stage] ──→ ... ──→ Transport::dispatch(ctx.outgoing())
//!   named, placed once at build time relative to anchors
//!
//! Receive side:
//! PipelineEvents { message_pulled, processing_succeeded, processing_failed,
//!                  retry_scheduled, receive_completed }
//!   handler lists fired synchronously in registration order
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use busmetrics_pipeline::{DispatchOperation, InMemoryTransport, PipelineBuilder};
//!
//! let transport = Arc::new(InMemoryTransport::new());
//! let mut builder = PipelineBuilder::new();
//! builder.register(MyStage::new());
//! let pipeline = builder.build(transport.clone())?;
//!
//! pipeline
//!     .dispatch(vec![DispatchOperation::unicast("Billing", b"{}".to_vec())])
//!     .await?;
//! assert_eq!(transport.sent_to("Billing").len(), 1);
//! ```

mod dispatch;
mod error;
mod events;
pub mod headers;
mod stage;
mod transport;


pub use dispatch::{
    AddressTag, DeliveryConstraints, DispatchContext, DispatchOperation, SubstitutionScope,
};
pub use error::{PipelineError, Result};
pub use events::{
    EventSource, IncomingMessage, PipelineEvents, ProcessingFailed, ReceiveCompleted,
    RetryScheduled,
};
pub use stage::{Next, Pipeline, PipelineBuilder, Stage};
pub use transport::{InMemoryTransport, Transport};
