//! Adapter layer between sources and the catalogue
//!
//! Sources describe what they found as contributions; the proposal builder
//! turns merged records into upserts; sinks deliver them.

mod builder;
mod jsonl;
mod memory;
mod registry;
mod sink;
mod source;

pub use builder::{ProposalBuilder, DEFAULT_OWNERSHIP_TYPE};
pub use jsonl::JsonLinesSink;
pub use memory::InMemoryCatalogue;
pub use registry::{SourceContext, SourceFactory, SourceRegistry};
pub use sink::{CatalogueSink, EmitResult, Rejection, SinkError, IS_PART_OF};
pub use source::{Collected, Source, SourceError};
