//! Named pipeline stages and their placement
//!
//! Stages are registered by name, optionally relative to an anchor stage.
//! [`PipelineBuilder::build`] resolves every placement once and produces a
//! [`Pipeline`] with a fixed order; nothing is looked up by name afterwards.
//!
//! # Placement
//!
//! - `register` appends in registration order
//! - `register_before(anchor, ..)` goes immediately before the anchor;
//!   several stages before the same anchor keep registration order
//! - `register_after(anchor, ..)` goes immediately after the anchor,
//!   following stages already placed after it
//!
//! An anchor may itself be a stage placed relative to another anchor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::dispatch::{DispatchContext, DispatchOperation};
use crate::error::{PipelineError, Result};
use crate::transport::Transport;

/// One step of the outgoing pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique stage name, used as an anchor by other stages
    fn name(&self) -> &str;

    /// Process the context; call `next.run(ctx)` to continue the chain
    async fn invoke(&self, ctx: &mut DispatchContext, next: Next<'_>) -> Result<()>;
}

/// The remainder of the chain after the current stage
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    transport: &'a dyn Transport,
}

impl Next<'_> {
    /// Run the remaining stages, then hand the outgoing operations to the
    /// transport
    pub async fn run(self, ctx: &mut DispatchContext) -> Result<()> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    transport: self.transport,
                };
                stage.invoke(ctx, next).await
            }
            None => {
                let outgoing = ctx.outgoing();
                if outgoing.is_empty() {
                    return Ok(());
                }
                self.transport.dispatch(outgoing).await
            }
        }
    }
}

/// Immutable, ordered stage chain ending in a transport
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    /// Run a dispatch of `operations` through every stage
    pub async fn dispatch(&self, operations: Vec<DispatchOperation>) -> Result<()> {
        let mut ctx = DispatchContext::new(operations);
        self.dispatch_context(&mut ctx).await
    }

    /// Run an existing context through every stage
    pub async fn dispatch_context(&self, ctx: &mut DispatchContext) -> Result<()> {
        Next {
            stages: &self.stages,
            transport: self.transport.as_ref(),
        }
        .run(ctx)
        .await
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

enum Placement {
    End,
    Before(String),
    After(String),
}

impl Placement {
    fn anchor(&self) -> Option<&str> {
        match self {
            Placement::End => None,
            Placement::Before(anchor) | Placement::After(anchor) => Some(anchor),
        }
    }
}

struct Registration {
    stage: Arc<dyn Stage>,
    placement: Placement,
}

/// Collects stages and their placement before the order is fixed
#[derive(Default)]
pub struct PipelineBuilder {
    registrations: Vec<Registration>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn register(&mut self, stage: impl Stage + 'static) -> &mut Self {
        self.push(Arc::new(stage), Placement::End)
    }

    /// Place a stage immediately before `anchor`
    pub fn register_before(
        &mut self,
        anchor: impl Into<String>,
        stage: impl Stage + 'static,
    ) -> &mut Self {
        self.push(Arc::new(stage), Placement::Before(anchor.into()))
    }

    /// Place a stage immediately after `anchor`
    pub fn register_after(
        &mut self,
        anchor: impl Into<String>,
        stage: impl Stage + 'static,
    ) -> &mut Self {
        self.push(Arc::new(stage), Placement::After(anchor.into()))
    }

    /// Whether a stage with this name has been registered
    pub fn contains(&self, name: &str) -> bool {
        self.registrations.iter().any(|r| r.stage.name() == name)
    }

    fn push(&mut self, stage: Arc<dyn Stage>, placement: Placement) -> &mut Self {
        self.registrations.push(Registration { stage, placement });
        self
    }

    /// Resolve placements and fix the stage order
    pub fn build(self, transport: Arc<dyn Transport>) -> Result<Pipeline> {
        let mut names = HashSet::new();
        for registration in &self.registrations {
            let name = registration.stage.name();
            if !names.insert(name.to_string()) {
                return Err(PipelineError::DuplicateStage(name.to_string()));
            }
        }

        let (ends, mut pending): (Vec<_>, Vec<_>) = self
            .registrations
            .into_iter()
            .partition(|r| r.placement.anchor().is_none());
        let mut order: Vec<Arc<dyn Stage>> = ends.into_iter().map(|r| r.stage).collect();
        let mut placed_after: HashMap<String, Vec<String>> = HashMap::new();

        while !pending.is_empty() {
            let before = pending.len();
            let mut unresolved = Vec::with_capacity(pending.len());

            for registration in pending {
                let anchor = registration.placement.anchor().unwrap_or_default().to_string();
                let Some(anchor_idx) = position(&order, &anchor) else {
                    unresolved.push(registration);
                    continue;
                };

                let idx = match registration.placement {
                    Placement::Before(_) => anchor_idx,
                    _ => {
                        let followers = placed_after.entry(anchor).or_default();
                        let last = followers
                            .iter()
                            .filter_map(|name| position(&order, name))
                            .max()
                            .unwrap_or(anchor_idx);
                        followers.push(registration.stage.name().to_string());
                        last + 1
                    }
                };
                order.insert(idx, registration.stage);
            }

            if unresolved.len() == before
                && let Some(first) = unresolved.first()
            {
                return Err(PipelineError::UnknownAnchor {
                    stage: first.stage.name().to_string(),
                    anchor: first.placement.anchor().unwrap_or_default().to_string(),
                });
            }
            pending = unresolved;
        }

        let pipeline = Pipeline {
            stages: order.into(),
            transport,
        };
        debug!(stages = ?pipeline.stage_names(), "pipeline built");
        Ok(pipeline)
    }
}

fn position(order: &[Arc<dyn Stage>], name: &str) -> Option<usize> {
    order.iter().position(|s| s.name() == name)
}
