//! Proposal builder: finalized records to upsert proposals
//!
//! Output order:
//! 1. label definitions (domains, then tags) and owner user entities
//! 2. per-record aspects, records in key order
//!
//! At most one proposal exists per `(target, aspect kind)`. When a later
//! proposal repeats a pair, its value replaces the earlier one in place.

use crate::model::urn::{domain_urn, tag_urn};
use crate::model::{Aspect, AspectKind, EntityKey, MergedEntityRecord, OwnerIdentity, Platform, UpsertProposal};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub const DEFAULT_OWNERSHIP_TYPE: &str = "DATAOWNER";

/// Ordered, deduplicated proposal list.
#[derive(Debug, Default)]
struct ProposalList {
    proposals: Vec<UpsertProposal>,
    index: BTreeMap<(String, AspectKind), usize>,
}

impl ProposalList {
    fn push(&mut self, proposal: UpsertProposal) {
        let key = (proposal.target.clone(), proposal.kind());
        match self.index.get(&key) {
            Some(&position) => self.proposals[position] = proposal,
            None => {
                self.index.insert(key, self.proposals.len());
                self.proposals.push(proposal);
            }
        }
    }

    fn into_vec(self) -> Vec<UpsertProposal> {
        self.proposals
    }
}

/// Turns finalized records into proposals for one platform.
#[derive(Debug, Clone)]
pub struct ProposalBuilder {
    platform: Platform,
    ownership_type: String,
}

impl ProposalBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ownership_type: DEFAULT_OWNERSHIP_TYPE.to_string(),
        }
    }

    pub fn with_ownership_type(mut self, ownership_type: impl Into<String>) -> Self {
        self.ownership_type = ownership_type.into();
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The URN an entity key maps to on this builder's platform.
    pub fn urn(&self, key: &EntityKey) -> String {
        match key {
            EntityKey::Container(name) => self.platform.container_urn(name),
            EntityKey::Dataset(name) => self.platform.dataset_urn(name),
            EntityKey::Chart(id) => self.platform.chart_urn(id),
            EntityKey::Dashboard(id) => self.platform.dashboard_urn(id),
        }
    }

    pub fn build(&self, records: &[MergedEntityRecord]) -> Vec<UpsertProposal> {
        let records: Vec<&MergedEntityRecord> = records
            .iter()
            .filter(|record| {
                if !record.is_finalized() {
                    warn!(record = %record.key, "skipping record that was never finalized");
                }
                record.is_finalized()
            })
            .collect();

        let mut list = ProposalList::default();
        self.push_definitions(&records, &mut list);
        for record in records {
            self.push_record(record, &mut list);
        }
        list.into_vec()
    }

    fn push_definitions(&self, records: &[&MergedEntityRecord], list: &mut ProposalList) {
        let domains: BTreeSet<&String> = records.iter().flat_map(|r| &r.domain_labels).collect();
        let tags: BTreeSet<&String> = records.iter().flat_map(|r| &r.display_tags).collect();

        for domain in domains {
            list.push(UpsertProposal::new(
                domain_urn(domain),
                Aspect::DomainDefinition {
                    name: domain.clone(),
                },
            ));
        }
        for tag in tags {
            list.push(UpsertProposal::new(
                tag_urn(tag),
                Aspect::TagDefinition {
                    name: tag.clone(),
                    description: None,
                },
            ));
        }

        let owners: BTreeMap<String, OwnerIdentity> = records
            .iter()
            .filter_map(|r| r.owner_identity.as_deref())
            .filter_map(OwnerIdentity::parse)
            .filter(OwnerIdentity::is_user)
            .map(|owner| (owner.urn.clone(), owner))
            .collect();
        for (urn, owner) in owners {
            list.push(UpsertProposal::new(
                urn,
                Aspect::UserInfo {
                    display_name: owner.display_name.unwrap_or_default(),
                    email: owner.email.unwrap_or_default(),
                    active: false,
                },
            ));
        }
    }

    fn push_record(&self, record: &MergedEntityRecord, list: &mut ProposalList) {
        let target = self.urn(&record.key);
        let mut push = |aspect: Aspect| list.push(UpsertProposal::new(target.clone(), aspect));

        match &record.key {
            EntityKey::Container(_) => {
                push(Aspect::Container {
                    name: record.display_name().to_string(),
                    description: record.description.clone(),
                    external_url: record.external_url.clone(),
                    qualified_name: record.qualified_name.clone(),
                    last_modified: record.last_modified,
                });
                if !record.custom_properties.is_empty() {
                    push(Aspect::Properties {
                        name: None,
                        description: None,
                        external_url: None,
                        qualified_name: None,
                        last_modified: None,
                        custom_properties: record.custom_properties.clone(),
                    });
                }
            }
            EntityKey::Dashboard(_) => {
                push(Aspect::Dashboard {
                    title: record.display_name().to_string(),
                    description: record.description.clone(),
                    external_url: record.external_url.clone(),
                    charts: record.members.iter().map(|m| self.urn(m)).collect(),
                });
            }
            EntityKey::Dataset(_) | EntityKey::Chart(_) => {
                let has_properties = record.name.is_some()
                    || record.description.is_some()
                    || record.external_url.is_some()
                    || record.qualified_name.is_some()
                    || record.last_modified.is_some()
                    || !record.custom_properties.is_empty();
                if has_properties {
                    push(Aspect::Properties {
                        name: record.name.clone(),
                        description: record.description.clone(),
                        external_url: record.external_url.clone(),
                        qualified_name: record.qualified_name.clone(),
                        last_modified: record.last_modified,
                        custom_properties: record.custom_properties.clone(),
                    });
                }
            }
        }

        if let Some(sub_type) = &record.sub_type {
            push(Aspect::SubTypes {
                type_names: vec![sub_type.clone()],
            });
        }

        if matches!(record.key, EntityKey::Container(_) | EntityKey::Dataset(_)) {
            if let Some(instance) = self.platform.instance_urn() {
                push(Aspect::PlatformInstance {
                    platform: self.platform.platform_urn(),
                    instance: Some(instance),
                });
            }
        }

        if !record.display_tags.is_empty() {
            push(Aspect::TagSet {
                tags: record.display_tags.iter().map(|t| tag_urn(t)).collect(),
            });
        }

        if !record.domain_labels.is_empty() {
            push(Aspect::DomainSet {
                domains: record.domain_labels.iter().map(|d| domain_urn(d)).collect(),
            });
        }

        if let Some(owner) = record.owner_identity.as_deref().and_then(OwnerIdentity::parse) {
            push(Aspect::Ownership {
                owners: vec![owner.urn],
                ownership_type: self.ownership_type.clone(),
            });
        }

        if let Some(parent) = &record.parent {
            push(Aspect::Containment {
                container: self.urn(parent),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MetadataMerger, RecordSet};
    use crate::model::Contribution;

    fn finalize(contributions: Vec<Contribution>) -> Vec<MergedEntityRecord> {
        let merger = MetadataMerger::new();
        let mut set = RecordSet::new();
        set.extend(&merger, contributions);
        set.finalize(&merger)
    }

    fn kinds_for(proposals: &[UpsertProposal], target: &str) -> Vec<AspectKind> {
        proposals
            .iter()
            .filter(|p| p.target == target)
            .map(UpsertProposal::kind)
            .collect()
    }

    // === Scenario: definitions precede references ===

    #[test]
    fn label_definitions_come_first() {
        let records = finalize(vec![
            Contribution::for_key(EntityKey::database("prison_database"))
                .with_domains(["Prison"])
                .with_tags(["Prison"])
                .with_owner("a.b@justice.gov.uk"),
        ]);
        let proposals = ProposalBuilder::new(Platform::new("dbt")).build(&records);

        assert_eq!(proposals[0].target, "urn:li:domain:Prison");
        assert_eq!(proposals[0].kind(), AspectKind::DomainDefinition);
        assert_eq!(proposals[1].target, "urn:li:tag:Prison");
        assert_eq!(proposals[2].target, "urn:li:corpuser:a.b");

        let first_reference = proposals
            .iter()
            .position(|p| matches!(p.kind(), AspectKind::DomainSet | AspectKind::TagSet))
            .unwrap();
        assert!(first_reference > 2);
    }

    // === Scenario: containment only with a parent ===

    #[test]
    fn orphan_dataset_gets_no_containment() {
        let records = finalize(vec![
            Contribution::for_key(EntityKey::Dataset("db.t".into())).with_name("t"),
            Contribution::for_key(EntityKey::Dataset("db.u".into()))
                .with_name("u")
                .with_parent(EntityKey::database("db")),
        ]);
        let builder = ProposalBuilder::new(Platform::new("dbt"));
        let proposals = builder.build(&records);

        let orphan = builder.urn(&EntityKey::Dataset("db.t".into()));
        assert!(!kinds_for(&proposals, &orphan).contains(&AspectKind::Containment));

        let child = builder.urn(&EntityKey::Dataset("db.u".into()));
        let containment = proposals
            .iter()
            .find(|p| p.target == child && p.kind() == AspectKind::Containment)
            .unwrap();
        assert_eq!(
            containment.aspect,
            Aspect::Containment {
                container: builder.urn(&EntityKey::database("db"))
            }
        );
    }

    // === Scenario: one proposal per (target, kind) ===

    #[test]
    fn at_most_one_proposal_per_target_and_kind() {
        let records = finalize(vec![
            Contribution::for_key(EntityKey::database("a"))
                .with_domains(["Courts"])
                .with_tags(["Courts"]),
            Contribution::for_key(EntityKey::database("b"))
                .with_domains(["Courts"])
                .with_tags(["Courts"]),
        ]);
        let proposals = ProposalBuilder::new(Platform::new("dbt")).build(&records);

        let mut seen = BTreeSet::new();
        for p in &proposals {
            assert!(seen.insert((p.target.clone(), p.kind())), "duplicate {:?}", p);
        }
        assert_eq!(
            proposals
                .iter()
                .filter(|p| p.kind() == AspectKind::DomainDefinition)
                .count(),
            1
        );
    }

    #[test]
    fn duplicate_push_keeps_first_position_last_value() {
        let mut list = ProposalList::default();
        list.push(UpsertProposal::new("x", Aspect::TagSet { tags: vec!["a".into()] }));
        list.push(UpsertProposal::new("y", Aspect::TagSet { tags: Vec::new() }));
        list.push(UpsertProposal::new("x", Aspect::TagSet { tags: vec!["b".into()] }));
        let proposals = list.into_vec();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].aspect, Aspect::TagSet { tags: vec!["b".into()] });
    }

    // === Scenario: shape of individual aspects ===

    #[test]
    fn dashboard_lists_member_chart_urns() {
        let records = finalize(vec![Contribution::for_key(EntityKey::Dashboard("Justice Data".into()))
            .with_name("Justice Data")
            .with_member(EntityKey::Chart("b".into()))
            .with_member(EntityKey::Chart("a".into()))]);
        let proposals = ProposalBuilder::new(Platform::new("justice-data")).build(&records);
        assert_eq!(
            proposals[0].aspect,
            Aspect::Dashboard {
                title: "Justice Data".into(),
                description: None,
                external_url: None,
                charts: vec![
                    "urn:li:chart:(justice-data,a)".into(),
                    "urn:li:chart:(justice-data,b)".into()
                ],
            }
        );
    }

    #[test]
    fn platform_instance_emitted_when_configured() {
        let records = finalize(vec![Contribution::for_key(EntityKey::Dataset("db.t".into())).with_name("t")]);
        let builder = ProposalBuilder::new(Platform::new("dbt").with_instance("cadet"));
        let proposals = builder.build(&records);
        assert!(proposals.iter().any(|p| p.kind() == AspectKind::PlatformInstance));

        let bare = ProposalBuilder::new(Platform::new("dbt")).build(&records);
        assert!(!bare.iter().any(|p| p.kind() == AspectKind::PlatformInstance));
    }

    #[test]
    fn unfinalized_records_are_skipped() {
        let record = MergedEntityRecord::new(EntityKey::database("db"));
        assert!(ProposalBuilder::new(Platform::default()).build(&[record]).is_empty());
    }
}
