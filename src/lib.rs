//! Catalogue ingestion: domain mapping, entity reconciliation and
//! idempotent upsert proposals for a metadata catalogue.
//!
//! # Core Concepts
//!
//! - **Sources**: read upstream documents (dbt manifests, publication and
//!   chart APIs) and describe entities as contributions
//! - **Mapping**: parse node names, resolve domains and subject areas,
//!   merge contributions into one record per entity, validate labels
//! - **Proposals**: deduplicated upsert operations keyed by stable URNs,
//!   delivered to a catalogue sink
//!
//! # Example
//!
//! ```
//! use catalogue_ingest::mapping::format_domain_name;
//!
//! assert_eq!(format_domain_name("electronic_monitoring"), "Electronic monitoring");
//! assert_eq!(format_domain_name("opg"), "OPG");
//! ```

pub mod adapter;
pub mod checks;
pub mod config;
pub mod fetch;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod sources;

pub use adapter::{CatalogueSink, InMemoryCatalogue, JsonLinesSink, Source, SourceRegistry};
pub use config::{ConfigError, IngestConfig};
pub use model::{EntityKey, Platform, UpsertProposal};
pub use pipeline::{IngestPipeline, PipelineError, RunSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
