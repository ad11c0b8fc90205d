//! Transport: the dispatch capability at the end of the pipeline
//!
//! `InMemoryTransport` records everything it is asked to send. Restricting it
//! to a set of known queues makes dispatches to anything else fail, the way a
//! broker rejects a missing queue.

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dispatch::{AddressTag, DispatchOperation};
use crate::error::{PipelineError, Result};

/// Sends operations to the messaging infrastructure
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a batch of operations
    async fn dispatch(&self, operations: &[DispatchOperation]) -> Result<()>;
}

/// In-process transport that records dispatched operations
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    queues: Option<BTreeSet<String>>,
    sent: Mutex<Vec<DispatchOperation>>,
}

impl InMemoryTransport {
    /// Accept sends to any destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept unicast sends only to the given queues
    pub fn with_queues<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: Some(queues.into_iter().map(Into::into).collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every operation sent so far
    pub fn sent(&self) -> Vec<DispatchOperation> {
        self.sent.lock().clone()
    }

    /// Operations sent to one destination, in send order
    pub fn sent_to(&self, destination: &str) -> Vec<DispatchOperation> {
        self.sent
            .lock()
            .iter()
            .filter(|op| op.destination() == Some(destination))
            .cloned()
            .collect()
    }

    /// Drain the recorded operations
    pub fn take(&self) -> Vec<DispatchOperation> {
        std::mem::take(&mut *self.sent.lock())
    }

    fn check(&self, operation: &DispatchOperation) -> Result<()> {
        let (Some(queues), AddressTag::Unicast(destination)) = (&self.queues, &operation.address)
        else {
            return Ok(());
        };
        if queues.contains(destination) {
            Ok(())
        } else {
            Err(PipelineError::transport(
                destination.clone(),
                "destination queue does not exist",
            ))
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn dispatch(&self, operations: &[DispatchOperation]) -> Result<()> {
        for operation in operations {
            self.check(operation)?;
        }
        self.sent.lock().extend(operations.iter().cloned());
        Ok(())
    }
}
