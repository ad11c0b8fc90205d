//! Outbound dispatch operations and the context stages operate on
//!
//! # Substitution
//!
//! A stage may swap the active operation list for the rest of the pipeline
//! with [`SubstitutionScope::enter`]. The originals are kept on a stack; a
//! later stage takes the substituted list back with
//! [`DispatchContext::restore_original`] and usually hands it to
//! [`DispatchContext::commit`] so the transport sends it. If the restoring
//! stage never runs (an error or a dropped future), the scope puts the
//! originals back when it goes out of scope.
//!
//! ```text
//! ctx.operations: [publish Event1]
//!     │ SubstitutionScope::enter(ctx, [to Billing, to Shipping])
//!     ▼
//! ctx.operations: [to Billing, to Shipping]   originals: [[publish Event1]]
//!     │ restore_original() -> [to Billing, to Shipping]; commit(..)
//!     ▼
//! ctx.operations: [publish Event1]            committed: [to Billing, to Shipping]
//! ```

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::headers;

/// Where an operation is going
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressTag {
    /// One named destination queue
    Unicast(String),
    /// Every subscriber of a message type
    Multicast { message_type: String },
}

/// Delivery constraints carried through duplication unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryConstraints {
    pub time_to_be_received: Option<Duration>,
    pub delay: Option<Duration>,
}

/// One outbound message send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOperation {
    pub message_id: String,
    pub address: AddressTag,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub constraints: DeliveryConstraints,
    /// Message type of the publish this send was fanned out from
    pub published_as: Option<String>,
}

impl DispatchOperation {
    /// Create an operation with a fresh message id
    pub fn new(address: AddressTag, body: impl Into<Vec<u8>>) -> Self {
        let message_id = Uuid::new_v4().to_string();
        let mut headers = BTreeMap::new();
        headers.insert(headers::MESSAGE_ID.to_string(), message_id.clone());
        if let AddressTag::Multicast { message_type } = &address {
            headers.insert(
                headers::ENCLOSED_MESSAGE_TYPES.to_string(),
                message_type.clone(),
            );
        }

        Self {
            message_id,
            address,
            headers,
            body: body.into(),
            constraints: DeliveryConstraints::default(),
            published_as: None,
        }
    }

    /// Send to one destination
    pub fn unicast(destination: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(AddressTag::Unicast(destination.into()), body)
    }

    /// Publish to every subscriber of `message_type`
    pub fn multicast(message_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(
            AddressTag::Multicast {
                message_type: message_type.into(),
            },
            body,
        )
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: DeliveryConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Destination queue for unicast operations
    pub fn destination(&self) -> Option<&str> {
        match &self.address {
            AddressTag::Unicast(destination) => Some(destination),
            AddressTag::Multicast { .. } => None,
        }
    }

    /// Message type of the payload, from the address or the header
    pub fn message_type(&self) -> Option<&str> {
        match &self.address {
            AddressTag::Multicast { message_type } => Some(message_type),
            AddressTag::Unicast(_) => self.header(headers::ENCLOSED_MESSAGE_TYPES),
        }
    }

    /// Copy of this operation addressed to a single destination
    ///
    /// Headers are copied, so stamping the copy leaves the original untouched.
    /// A copy of a multicast operation remembers the published message type.
    pub fn duplicate_for(&self, destination: impl Into<String>) -> Self {
        let published_as = match &self.address {
            AddressTag::Multicast { message_type } => Some(message_type.clone()),
            AddressTag::Unicast(_) => self.published_as.clone(),
        };
        Self {
            message_id: self.message_id.clone(),
            address: AddressTag::Unicast(destination.into()),
            headers: self.headers.clone(),
            body: self.body.clone(),
            constraints: self.constraints.clone(),
            published_as,
        }
    }
}

/// Mutable state passed down the stage chain for one dispatch
#[derive(Debug, Default)]
pub struct DispatchContext {
    operations: Vec<DispatchOperation>,
    originals: Vec<Vec<DispatchOperation>>,
    committed: Option<Vec<DispatchOperation>>,
}

impl DispatchContext {
    pub fn new(operations: Vec<DispatchOperation>) -> Self {
        Self {
            operations,
            originals: Vec::new(),
            committed: None,
        }
    }

    /// Operations currently visible to stages
    #[inline]
    pub fn operations(&self) -> &[DispatchOperation] {
        &self.operations
    }

    #[inline]
    pub fn operations_mut(&mut self) -> &mut [DispatchOperation] {
        &mut self.operations
    }

    /// Whether a substitution is active
    #[inline]
    pub fn is_substituted(&self) -> bool {
        !self.originals.is_empty()
    }

    /// Replace the active operations, keeping the current ones to restore
    ///
    /// Prefer [`SubstitutionScope::enter`], which guarantees the restore.
    pub fn substitute(&mut self, operations: Vec<DispatchOperation>) {
        let original = std::mem::replace(&mut self.operations, operations);
        self.originals.push(original);
    }

    /// Undo the innermost substitution, returning the substituted operations
    pub fn restore_original(&mut self) -> Option<Vec<DispatchOperation>> {
        let original = self.originals.pop()?;
        Some(std::mem::replace(&mut self.operations, original))
    }

    /// Mark operations as the ones the transport sends for this dispatch
    pub fn commit(&mut self, operations: Vec<DispatchOperation>) {
        self.committed
            .get_or_insert_with(Vec::new)
            .extend(operations);
    }

    /// What the transport sends: committed operations if any stage committed,
    /// otherwise the active operations
    pub fn outgoing(&self) -> &[DispatchOperation] {
        self.committed.as_deref().unwrap_or(&self.operations)
    }
}

/// Scoped substitution of a context's operations
///
/// Dereferences to the context, so it can be handed to the next stage.
/// Dropping the scope restores every substitution made since it was entered
/// that was not restored explicitly.
pub struct SubstitutionScope<'a> {
    context: &'a mut DispatchContext,
    depth: usize,
}

impl<'a> SubstitutionScope<'a> {
    pub fn enter(context: &'a mut DispatchContext, operations: Vec<DispatchOperation>) -> Self {
        let depth = context.originals.len();
        context.substitute(operations);
        Self { context, depth }
    }
}

impl Deref for SubstitutionScope<'_> {
    type Target = DispatchContext;

    fn deref(&self) -> &DispatchContext {
        self.context
    }
}

impl DerefMut for SubstitutionScope<'_> {
    fn deref_mut(&mut self) -> &mut DispatchContext {
        self.context
    }
}

impl Drop for SubstitutionScope<'_> {
    fn drop(&mut self) {
        while self.context.originals.len() > self.depth {
            debug!("restoring dispatch operations after abandoned substitution");
            self.context.restore_original();
        }
    }
}
