//! CatalogueSink trait and emission result types
//!
//! The sink is the interface through which pipelines push upsert proposals
//! to the catalogue. Wire encoding, batching and retry are the sink's
//! business. `emit()` is async; the pipeline awaits the result.

use crate::model::{Aspect, AspectKind, UpsertProposal};
use async_trait::async_trait;
use thiserror::Error;

/// Relationship from a dataset or chart to the container that holds it.
pub const IS_PART_OF: &str = "IsPartOf";

/// A single proposal the sink refused.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Target URN of the rejected proposal
    pub target: String,
    pub kind: AspectKind,
    pub reason: String,
}

impl Rejection {
    pub fn new(proposal: &UpsertProposal, reason: impl Into<String>) -> Self {
        Self {
            target: proposal.target.clone(),
            kind: proposal.kind(),
            reason: reason.into(),
        }
    }
}

/// The result of an `emit()` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitResult {
    /// Number of proposals accepted
    pub committed: usize,
    /// Proposals refused, with reasons
    pub rejections: Vec<Rejection>,
}

impl EmitResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn committed(count: usize) -> Self {
        Self {
            committed: count,
            rejections: Vec::new(),
        }
    }

    /// True if no proposal was rejected
    pub fn is_fully_committed(&self) -> bool {
        self.rejections.is_empty()
    }

    /// True if nothing was committed and nothing was rejected
    pub fn is_noop(&self) -> bool {
        self.committed == 0 && self.rejections.is_empty()
    }

    pub fn absorb(&mut self, other: EmitResult) {
        self.committed += other.committed;
        self.rejections.extend(other.rejections);
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode proposal: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where proposals go, plus the reads post-ingestion checks need.
#[async_trait]
pub trait CatalogueSink: Send + Sync {
    /// Deliver proposals in order.
    async fn emit(&self, proposals: Vec<UpsertProposal>) -> Result<EmitResult, SinkError>;

    /// Outgoing relations of `urn` with the given relationship name.
    async fn get_related_entities(
        &self,
        urn: &str,
        relationship: &str,
    ) -> Result<Vec<String>, SinkError>;

    /// The current value of one aspect of one entity, if any.
    async fn get_latest_value(
        &self,
        urn: &str,
        kind: AspectKind,
    ) -> Result<Option<Aspect>, SinkError>;
}
