//! Value types shared by the mapping core, sources and sinks

mod node;
mod proposal;
mod record;
pub mod urn;

pub use node::{
    DatabaseEntry, DatabaseMetadata, Manifest, NodeDescriptor, ResolvedIdentity, ResourceKind,
};
pub use proposal::{Aspect, AspectKind, UpsertProposal};
pub use record::{Contribution, EntityKey, MergedEntityRecord};
pub use urn::{OwnerIdentity, Platform};
