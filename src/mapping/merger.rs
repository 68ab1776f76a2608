//! Metadata merger: folds per-source contributions into one record per entity
//!
//! Merge rules:
//! - Scalars: the latest non-empty value wins, unless an earlier value was
//!   written at a strictly higher source priority. Empty never overwrites.
//! - Label and tag sets, members: union, no removals.
//! - Custom properties: shallow key overwrite; empty values are ignored.
//! - At finalize: static properties overwrite source values, and the
//!   display marker is added to qualifying records.

use crate::model::{Contribution, EntityKey, MergedEntityRecord};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Tag that makes an entity visible in the catalogue front end.
pub const DISPLAY_MARKER: &str = "dc_display_in_catalogue";

/// Merges contributions and finalizes records.
#[derive(Debug, Clone)]
pub struct MetadataMerger {
    static_properties: BTreeMap<String, String>,
    display_marker: String,
    exclude_patterns: Vec<String>,
    scope: Option<String>,
}

impl Default for MetadataMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataMerger {
    pub fn new() -> Self {
        Self {
            static_properties: BTreeMap::new(),
            display_marker: DISPLAY_MARKER.to_string(),
            exclude_patterns: Vec::new(),
            scope: None,
        }
    }

    pub fn with_static_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_static_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.static_properties.extend(properties);
        self
    }

    pub fn with_display_marker(mut self, marker: impl Into<String>) -> Self {
        self.display_marker = marker.into();
        self
    }

    pub fn with_exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Identifier prefix shared by every entity in the run, such as the
    /// platform instance. Exclusion patterns are matched against it too.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn display_marker(&self) -> &str {
        &self.display_marker
    }

    /// True when an exclusion pattern appears in the run scope or in the
    /// entity's own name.
    pub fn is_excluded(&self, key: &EntityKey) -> bool {
        self.exclude_patterns.iter().any(|pattern| {
            key.name().contains(pattern.as_str())
                || self.scope.as_deref().is_some_and(|s| s.contains(pattern.as_str()))
        })
    }

    /// Fold one contribution into the record for its key.
    ///
    /// A contribution for a different key than `existing` is ignored.
    pub fn merge(
        &self,
        existing: Option<MergedEntityRecord>,
        contribution: Contribution,
    ) -> MergedEntityRecord {
        let mut record = existing.unwrap_or_else(|| MergedEntityRecord::new(contribution.key.clone()));

        if record.key != contribution.key {
            warn!(
                record = %record.key,
                contribution = %contribution.key,
                "contribution key does not match record, ignoring"
            );
            return record;
        }
        if record.finalized {
            warn!(record = %record.key, "merging into a finalized record");
        }

        let p = contribution.priority;
        let slots = &mut record.priorities;
        merge_text(&mut record.name, &mut slots.name, contribution.name, p);
        merge_text(&mut record.description, &mut slots.description, contribution.description, p);
        merge_text(&mut record.owner_identity, &mut slots.owner, contribution.owner_identity, p);
        merge_text(&mut record.external_url, &mut slots.external_url, contribution.external_url, p);
        merge_text(
            &mut record.qualified_name,
            &mut slots.qualified_name,
            contribution.qualified_name,
            p,
        );
        merge_text(&mut record.sub_type, &mut slots.sub_type, contribution.sub_type, p);
        merge_value(&mut record.last_modified, &mut slots.last_modified, contribution.last_modified, p);
        merge_value(&mut record.parent, &mut slots.parent, contribution.parent, p);

        record.domain_labels.extend(non_empty(contribution.domain_labels));
        record.display_tags.extend(non_empty(contribution.display_tags));
        record.members.extend(contribution.members);
        record.displayable |= contribution.displayable;

        for (key, value) in contribution.custom_properties {
            if value.trim().is_empty() {
                continue;
            }
            record.custom_properties.insert(key, value);
        }

        record
    }

    /// Apply static properties and the display marker. Idempotent.
    pub fn finalize(&self, mut record: MergedEntityRecord) -> MergedEntityRecord {
        for (key, value) in &self.static_properties {
            record.custom_properties.insert(key.clone(), value.clone());
        }

        if record.displayable && !self.display_marker.is_empty() {
            if self.is_excluded(&record.key) {
                debug!(record = %record.key, "display marker suppressed by exclusion list");
            } else {
                record.display_tags.insert(self.display_marker.clone());
            }
        }

        record.finalized = true;
        record
    }
}

fn merge_text(slot: &mut Option<String>, written_at: &mut u8, incoming: Option<String>, priority: u8) {
    let incoming = incoming.filter(|v| !v.trim().is_empty());
    merge_value(slot, written_at, incoming, priority);
}

fn merge_value<T>(slot: &mut Option<T>, written_at: &mut u8, incoming: Option<T>, priority: u8) {
    let Some(value) = incoming else { return };
    if slot.is_none() || priority >= *written_at {
        *slot = Some(value);
        *written_at = priority;
    }
}

fn non_empty(labels: impl IntoIterator<Item = String>) -> impl Iterator<Item = String> {
    labels.into_iter().filter(|l| !l.trim().is_empty())
}

/// Per-run accumulator: one record per key, created lazily.
///
/// Records are only reachable through [`RecordSet::finalize`], which
/// consumes the set, so nothing is handed on half-merged.
#[derive(Debug, Default)]
pub struct RecordSet {
    records: BTreeMap<EntityKey, MergedEntityRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contribute(&mut self, merger: &MetadataMerger, contribution: Contribution) {
        let key = contribution.key.clone();
        let existing = self.records.remove(&key);
        let merged = merger.merge(existing, contribution);
        self.records.insert(key, merged);
    }

    pub fn extend<I>(&mut self, merger: &MetadataMerger, contributions: I)
    where
        I: IntoIterator<Item = Contribution>,
    {
        for contribution in contributions {
            self.contribute(merger, contribution);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.records.contains_key(key)
    }

    /// Finalize every record, in key order.
    pub fn finalize(self, merger: &MetadataMerger) -> Vec<MergedEntityRecord> {
        self.records
            .into_values()
            .map(|record| merger.finalize(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db(name: &str) -> Contribution {
        Contribution::for_key(EntityKey::database(name))
    }

    // === Scenario: scalar fields ===

    #[test]
    fn empty_description_never_overwrites() {
        let merger = MetadataMerger::new();
        let first = merger.merge(None, db("prison_database").with_description("foo"));
        let second = merger.merge(Some(first), db("prison_database").with_description(""));
        assert_eq!(second.description.as_deref(), Some("foo"));
    }

    #[test]
    fn later_non_empty_value_wins_at_equal_priority() {
        let merger = MetadataMerger::new();
        let first = merger.merge(None, db("d").with_owner("a@justice.gov.uk"));
        let second = merger.merge(Some(first), db("d").with_owner("b@justice.gov.uk"));
        assert_eq!(second.owner_identity.as_deref(), Some("b@justice.gov.uk"));
    }

    #[test]
    fn lower_priority_cannot_overwrite_higher() {
        let merger = MetadataMerger::new();
        let first = merger.merge(None, db("d").with_priority(2).with_description("curated"));
        let second = merger.merge(Some(first), db("d").with_priority(1).with_description("generated"));
        assert_eq!(second.description.as_deref(), Some("curated"));

        let third = merger.merge(Some(second), db("d").with_priority(3).with_description("override"));
        assert_eq!(third.description.as_deref(), Some("override"));
    }

    // === Scenario: collections ===

    #[test]
    fn tag_sets_are_unioned() {
        let merger = MetadataMerger::new();
        let first = merger.merge(None, db("d").with_tags([DISPLAY_MARKER]));
        let second = merger.merge(Some(first), db("d").with_tags(["Courts"]));
        let tags: Vec<_> = second.display_tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["Courts", DISPLAY_MARKER]);
    }

    #[test]
    fn custom_properties_overwrite_by_key() {
        let merger = MetadataMerger::new();
        let first = merger.merge(
            None,
            db("d").with_property("a", "1").with_property("b", "1"),
        );
        let second = merger.merge(
            Some(first),
            db("d").with_property("b", "2").with_property("a", ""),
        );
        assert_eq!(second.custom_properties["a"], "1");
        assert_eq!(second.custom_properties["b"], "2");
    }

    #[test]
    fn mismatched_key_is_ignored() {
        let merger = MetadataMerger::new();
        let record = merger.merge(None, db("a").with_description("x"));
        let after = merger.merge(Some(record.clone()), db("b").with_description("y"));
        assert_eq!(after, record);
    }

    // === Scenario: finalization ===

    #[test]
    fn static_properties_win_over_source_values() {
        let merger = MetadataMerger::new().with_static_property("security_classification", "Official");
        let record = merger.merge(None, db("d").with_property("security_classification", "Secret"));
        let record = merger.finalize(record);
        assert_eq!(record.custom_properties["security_classification"], "Official");
        assert!(record.is_finalized());
    }

    #[test]
    fn display_marker_added_only_when_displayable_and_not_excluded() {
        let merger = MetadataMerger::new().with_exclude_patterns(["athena_cadet"]);

        let shown = merger.finalize(merger.merge(None, db("prison_database").displayable(true)));
        assert!(shown.display_tags.contains(DISPLAY_MARKER));

        let hidden = merger.finalize(merger.merge(None, db("prison_database")));
        assert!(!hidden.display_tags.contains(DISPLAY_MARKER));

        let excluded = merger.finalize(merger.merge(None, db("athena_cadet_x").displayable(true)));
        assert!(!excluded.display_tags.contains(DISPLAY_MARKER));

        let scoped = MetadataMerger::new()
            .with_exclude_patterns(["athena_cadet"])
            .with_scope("athena_cadet.awsdatacatalog");
        let out = scoped.finalize(scoped.merge(None, db("prison_database").displayable(true)));
        assert!(!out.display_tags.contains(DISPLAY_MARKER));
    }

    #[test]
    fn finalize_is_idempotent() {
        let merger = MetadataMerger::new().with_static_property("audience", "Internal");
        let once = merger.finalize(merger.merge(None, db("d").displayable(true)));
        let twice = merger.finalize(once.clone());
        assert_eq!(once, twice);
    }

    // === Scenario: record set ===

    #[test]
    fn record_set_replays_deterministically() {
        let merger = MetadataMerger::new();
        let contributions = vec![
            db("b").with_tags(["x"]),
            Contribution::for_key(EntityKey::Dataset("b.t".into())).with_parent(EntityKey::database("b")),
            db("a").with_description("first"),
            db("b").with_tags(["y"]),
        ];

        let mut left = RecordSet::new();
        left.extend(&merger, contributions.clone());
        let mut right = RecordSet::new();
        right.extend(&merger, contributions);

        let left = left.finalize(&merger);
        assert_eq!(left, right.finalize(&merger));
        assert_eq!(left.len(), 3);
        assert_eq!(left[0].key, EntityKey::database("a"));
        assert_eq!(left[1].display_tags.len(), 2);
    }
}
