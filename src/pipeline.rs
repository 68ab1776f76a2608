//! Pipeline runner: one source, start to finish
//!
//! Stages:
//! 1. the source collects contributions from upstream
//! 2. configured labels are checked against the catalogue; any unknown
//!    label aborts the run before a single proposal is emitted
//! 3. sources that extend existing entities get those entities' current
//!    catalogue state as lowest-priority contributions
//! 4. contributions are merged and finalized into one record per entity
//! 5. records become deduplicated upsert proposals
//! 6. proposals go to the sink

use crate::adapter::{CatalogueSink, Collected, EmitResult, ProposalBuilder, SinkError, Source, SourceError};
use crate::fetch::{CatalogueReader, FetchError};
use crate::mapping::{validate, MetadataMerger, RecordSet, ValidationError};
use crate::model::urn::tag_name;
use crate::model::{Aspect, AspectKind, Contribution, EntityKey, UpsertProposal};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Priority of what the catalogue already holds: any source value wins.
const EXISTING_PRIORITY: u8 = 0;

/// Aspects a later run rebuilds in full, so their current value must be
/// carried into the record or it is lost.
const CARRIED_ASPECTS: [AspectKind; 3] = [AspectKind::Container, AspectKind::Properties, AspectKind::TagSet];

/// Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot read catalogue labels: {0}")]
    Labels(#[from] FetchError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub pipeline: String,
    pub records: usize,
    pub proposals: usize,
    pub emitted: EmitResult,
    pub elapsed_ms: u128,
}

/// Proposals for one run, built but not yet emitted.
#[derive(Debug, Clone)]
pub struct Plan {
    pub records: usize,
    pub proposals: Vec<UpsertProposal>,
}

pub struct IngestPipeline {
    source: Box<dyn Source>,
    merger: MetadataMerger,
    labels: Arc<dyn CatalogueReader>,
    sink: Arc<dyn CatalogueSink>,
}

impl IngestPipeline {
    pub fn new(
        source: Box<dyn Source>,
        labels: Arc<dyn CatalogueReader>,
        sink: Arc<dyn CatalogueSink>,
    ) -> Self {
        Self {
            source,
            merger: MetadataMerger::new(),
            labels,
            sink,
        }
    }

    /// Replace the default merger (display marker, exclusions, scope).
    pub fn with_merger(mut self, merger: MetadataMerger) -> Self {
        self.merger = merger;
        self
    }

    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Collect, validate, merge and build without touching the sink.
    pub async fn plan(&self) -> Result<Plan, PipelineError> {
        let collected = self
            .source
            .collect()
            .instrument(info_span!("collect", pipeline = self.source.id()))
            .await?;
        info!(contributions = collected.len(), "collected");

        self.check_labels(&collected)
            .instrument(info_span!("validate", pipeline = self.source.id()))
            .await?;

        let mut builder = ProposalBuilder::new(self.source.platform().clone());
        if let Some(ownership_type) = &collected.ownership_type {
            builder = builder.with_ownership_type(ownership_type.clone());
        }

        let existing = if collected.extends_existing {
            self.existing_state(&builder, &collected.contributions)
                .instrument(info_span!("existing", pipeline = self.source.id()))
                .await?
        } else {
            Vec::new()
        };

        let span = info_span!("build", pipeline = self.source.id());
        let _entered = span.enter();

        let merger = self
            .merger
            .clone()
            .with_static_properties(collected.static_properties.clone());

        let mut records = RecordSet::new();
        records.extend(&merger, existing);
        records.extend(&merger, collected.contributions);
        let records = records.finalize(&merger);
        let proposals = builder.build(&records);
        debug!(records = records.len(), proposals = proposals.len(), "built proposals");

        Ok(Plan {
            records: records.len(),
            proposals,
        })
    }

    /// Run every stage and emit the proposals.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let plan = self.plan().await?;
        let proposals = plan.proposals.len();

        let emitted = self
            .sink
            .emit(plan.proposals)
            .instrument(info_span!("emit", pipeline = self.source.id()))
            .await?;

        let elapsed_ms = started.elapsed().as_millis();
        info!(
            pipeline = self.source.id(),
            records = plan.records,
            proposals,
            committed = emitted.committed,
            rejected = emitted.rejections.len(),
            elapsed_ms,
            "run complete"
        );

        Ok(RunSummary {
            pipeline: self.source.id().to_string(),
            records: plan.records,
            proposals,
            emitted,
            elapsed_ms,
        })
    }

    /// What the catalogue holds for every entity the contributions touch,
    /// one lowest-priority contribution per entity found.
    async fn existing_state(
        &self,
        builder: &ProposalBuilder,
        contributions: &[Contribution],
    ) -> Result<Vec<Contribution>, SinkError> {
        let keys: BTreeSet<&EntityKey> = contributions.iter().map(|c| &c.key).collect();
        let mut existing = Vec::new();
        for key in keys {
            let urn = builder.urn(key);
            let mut contribution = Contribution::for_key(key.clone()).with_priority(EXISTING_PRIORITY);
            let mut found = false;
            for kind in CARRIED_ASPECTS {
                if let Some(aspect) = self.sink.get_latest_value(&urn, kind).await? {
                    contribution = carry(contribution, aspect);
                    found = true;
                }
            }
            if found {
                debug!(%urn, entity = %key, "merging existing catalogue state");
                existing.push(contribution);
            } else {
                warn!(%urn, entity = %key, "entity to extend is not in the catalogue yet");
            }
        }
        Ok(existing)
    }

    async fn check_labels(&self, collected: &Collected) -> Result<(), PipelineError> {
        for (kind, configured) in &collected.configured_labels {
            if configured.is_empty() {
                continue;
            }
            let known = self.labels.list_labels(*kind).await?;
            validate(*kind, configured, &known)?;
            debug!(%kind, count = configured.len(), "configured labels exist");
        }
        Ok(())
    }
}

/// Fold one stored aspect into a contribution. Scalars already set on
/// `contribution` are kept.
fn carry(mut contribution: Contribution, aspect: Aspect) -> Contribution {
    match aspect {
        Aspect::Container {
            name,
            description,
            external_url,
            qualified_name,
            last_modified,
        } => {
            contribution.name = contribution.name.or(Some(name));
            contribution.description = contribution.description.or(description);
            contribution.external_url = contribution.external_url.or(external_url);
            contribution.qualified_name = contribution.qualified_name.or(qualified_name);
            contribution.last_modified = contribution.last_modified.or(last_modified);
        }
        Aspect::Properties {
            name,
            description,
            external_url,
            qualified_name,
            last_modified,
            custom_properties,
        } => {
            contribution.name = contribution.name.or(name);
            contribution.description = contribution.description.or(description);
            contribution.external_url = contribution.external_url.or(external_url);
            contribution.qualified_name = contribution.qualified_name.or(qualified_name);
            contribution.last_modified = contribution.last_modified.or(last_modified);
            contribution.custom_properties.extend(custom_properties);
        }
        Aspect::TagSet { tags } => {
            contribution = contribution.with_tags(tags.iter().filter_map(|urn| tag_name(urn)));
        }
        _ => {}
    }
    contribution
}
