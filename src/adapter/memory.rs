//! In-memory catalogue: a real sink with no server behind it
//!
//! Keeps the latest aspect per `(urn, kind)` and the full emission log.
//! Relations are derived from containment aspects; label lists are the
//! seeded labels plus every label defined through the sink.

use super::sink::{CatalogueSink, EmitResult, SinkError, IS_PART_OF};
use crate::fetch::{CatalogueReader, FetchError};
use crate::mapping::LabelKind;
use crate::model::{Aspect, AspectKind, UpsertProposal};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    latest: BTreeMap<(String, AspectKind), Aspect>,
    log: Vec<UpsertProposal>,
    domains: BTreeSet<String>,
    tags: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalogue {
    state: Mutex<State>,
}

impl InMemoryCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels that exist before any run.
    pub fn with_domains<I, S>(self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().domains.extend(domains.into_iter().map(Into::into));
        self
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Replay a JSON Lines proposal log, as written by `JsonLinesSink`.
    pub fn load_jsonl(path: &Path) -> Result<Self, SinkError> {
        let catalogue = Self::new();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let proposal: UpsertProposal = serde_json::from_str(&line)?;
            catalogue.apply(proposal);
        }
        Ok(catalogue)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, proposal: UpsertProposal) {
        let mut state = self.lock();
        match &proposal.aspect {
            Aspect::DomainDefinition { name } => {
                state.domains.insert(name.clone());
            }
            Aspect::TagDefinition { name, .. } => {
                state.tags.insert(name.clone());
            }
            _ => {}
        }
        state
            .latest
            .insert((proposal.target.clone(), proposal.kind()), proposal.aspect.clone());
        state.log.push(proposal);
    }

    /// Every proposal received, in order.
    pub fn proposals(&self) -> Vec<UpsertProposal> {
        self.lock().log.clone()
    }

    pub fn latest(&self, urn: &str, kind: AspectKind) -> Option<Aspect> {
        self.lock().latest.get(&(urn.to_string(), kind)).cloned()
    }

    /// Distinct entity URNs that have at least one aspect.
    pub fn entities(&self) -> BTreeSet<String> {
        self.lock().latest.keys().map(|(urn, _)| urn.clone()).collect()
    }
}

#[async_trait]
impl CatalogueSink for InMemoryCatalogue {
    async fn emit(&self, proposals: Vec<UpsertProposal>) -> Result<EmitResult, SinkError> {
        let count = proposals.len();
        for proposal in proposals {
            self.apply(proposal);
        }
        Ok(EmitResult::committed(count))
    }

    async fn get_related_entities(
        &self,
        urn: &str,
        relationship: &str,
    ) -> Result<Vec<String>, SinkError> {
        if relationship != IS_PART_OF {
            return Ok(Vec::new());
        }
        Ok(match self.latest(urn, AspectKind::Containment) {
            Some(Aspect::Containment { container }) => vec![container],
            _ => Vec::new(),
        })
    }

    async fn get_latest_value(
        &self,
        urn: &str,
        kind: AspectKind,
    ) -> Result<Option<Aspect>, SinkError> {
        Ok(self.latest(urn, kind))
    }
}

#[async_trait]
impl CatalogueReader for InMemoryCatalogue {
    async fn list_labels(&self, kind: LabelKind) -> Result<BTreeSet<String>, FetchError> {
        let state = self.lock();
        Ok(match kind {
            LabelKind::Domain => state.domains.clone(),
            LabelKind::Tag => state.tags.clone(),
        })
    }
}
