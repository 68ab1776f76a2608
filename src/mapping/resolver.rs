//! Domain and subject-area resolution
//!
//! One resolver serves every pipeline. What differs between them is the
//! [`ResolutionPolicy`]: whether the first matching layer wins or all layers
//! are unioned, how raw labels are canonicalized, and what the fallback is.
//!
//! Lookup layers, in order:
//! 1. the static mapping table, keyed by a stable external id
//! 2. labels inherited from an already-resolved parent
//! 3. labels embedded on the node by the upstream source
//! 4. the configured default, only when 1-3 produced nothing

use super::formatter::DomainNameFormatter;
use crate::model::ResolvedIdentity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How matched layers combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// The first layer that yields any label decides the result
    #[default]
    FirstMatch,
    /// Every matching layer contributes
    Union,
}

/// How raw labels become canonical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    /// Run through the [`DomainNameFormatter`]
    #[default]
    DomainName,
    /// Subject-area names are already human-readable; only trimmed
    SubjectArea,
}

/// Per-pipeline resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolutionPolicy {
    pub mode: ResolutionMode,
    pub style: LabelStyle,
    pub default: Option<String>,
}

impl ResolutionPolicy {
    pub fn first_match() -> Self {
        Self::default()
    }

    pub fn union() -> Self {
        Self {
            mode: ResolutionMode::Union,
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: LabelStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_default(mut self, label: impl Into<String>) -> Self {
        self.default = Some(label.into());
        self
    }
}

/// Static id -> labels table. Loaded from configuration and passed in;
/// a single string value is accepted in place of a one-element list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    entries: BTreeMap<String, OneOrMany>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn as_slice(&self) -> &[String] {
        match self {
            Self::One(label) => std::slice::from_ref(label),
            Self::Many(labels) => labels,
        }
    }
}

impl LabelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry<I, S>(mut self, id: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            id.into(),
            OneOrMany::Many(labels.into_iter().map(Into::into).collect()),
        );
        self
    }

    pub fn get(&self, id: &str) -> Option<&[String]> {
        self.entries.get(id).map(OneOrMany::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every raw label in the table, for validation against the catalogue.
    pub fn all_labels(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .flat_map(|v| v.as_slice().iter().cloned())
            .collect()
    }
}

/// The canonical labels attached to one database, table or chart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DomainAssignment {
    pub labels: BTreeSet<String>,
}

impl DomainAssignment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(label: impl Into<String>) -> Self {
        Self {
            labels: BTreeSet::from([label.into()]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.labels.iter()
    }

    pub fn union_with(&mut self, other: &DomainAssignment) {
        self.labels.extend(other.labels.iter().cloned());
    }
}

impl<S: Into<String>> FromIterator<S> for DomainAssignment {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a caller knows about the thing being resolved.
#[derive(Debug, Clone, Default)]
pub struct ResolutionInput<'a> {
    pub external_id: Option<&'a str>,
    pub inherited: Option<&'a DomainAssignment>,
    pub embedded: Vec<&'a str>,
}

impl<'a> ResolutionInput<'a> {
    pub fn by_id(id: &'a str) -> Self {
        Self {
            external_id: Some(id),
            ..Self::default()
        }
    }

    pub fn embedded(label: &'a str) -> Self {
        Self {
            embedded: vec![label],
            ..Self::default()
        }
    }

    pub fn with_inherited(mut self, inherited: &'a DomainAssignment) -> Self {
        self.inherited = Some(inherited);
        self
    }

    pub fn with_embedded(mut self, label: &'a str) -> Self {
        self.embedded.push(label);
        self
    }
}

/// Resolves nodes to canonical labels under one policy.
#[derive(Debug, Clone, Default)]
pub struct DomainResolver {
    policy: ResolutionPolicy,
    mapping: LabelMapping,
    formatter: DomainNameFormatter,
}

impl DomainResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            mapping: LabelMapping::default(),
            formatter: DomainNameFormatter::default(),
        }
    }

    pub fn with_mapping(mut self, mapping: LabelMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_formatter(mut self, formatter: DomainNameFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    pub fn mapping(&self) -> &LabelMapping {
        &self.mapping
    }

    /// Canonical form of a raw label under this resolver's style.
    pub fn canonical(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match self.policy.style {
            LabelStyle::DomainName => self.formatter.format(trimmed),
            LabelStyle::SubjectArea => trimmed.to_string(),
        })
    }

    pub fn resolve(&self, input: &ResolutionInput<'_>) -> DomainAssignment {
        let mapped: DomainAssignment = input
            .external_id
            .and_then(|id| self.mapping.get(id))
            .map(|labels| labels.iter().filter_map(|l| self.canonical(l)).collect())
            .unwrap_or_default();

        // Inherited labels were canonicalized when the parent resolved.
        let inherited = input.inherited.cloned().unwrap_or_default();

        let embedded: DomainAssignment = input
            .embedded
            .iter()
            .filter_map(|l| self.canonical(l))
            .collect();

        let mut result = DomainAssignment::empty();
        for layer in [&mapped, &inherited, &embedded] {
            match self.policy.mode {
                ResolutionMode::FirstMatch if !layer.is_empty() => return layer.clone(),
                ResolutionMode::FirstMatch => {}
                ResolutionMode::Union => result.union_with(layer),
            }
        }

        if result.is_empty() {
            if let Some(label) = self.policy.default.as_deref().and_then(|d| self.canonical(d)) {
                result.labels.insert(label);
            }
        }
        result
    }
}

/// Domains each database picked up from its model nodes.
///
/// Seeds have no domain of their own: a seed takes whatever the models in
/// its database resolved to, and nothing if no model shares the database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseDomains {
    by_database: BTreeMap<String, DomainAssignment>,
}

impl DatabaseDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a model's resolved domain against its database.
    pub fn record(&mut self, identity: &ResolvedIdentity, assignment: &DomainAssignment) {
        if assignment.is_empty() {
            return;
        }
        self.by_database
            .entry(identity.database.clone())
            .or_default()
            .union_with(assignment);
    }

    pub fn get(&self, database: &str) -> Option<&DomainAssignment> {
        self.by_database.get(database)
    }

    /// The assignment a seed in this database inherits.
    pub fn for_seed(&self, identity: &ResolvedIdentity) -> DomainAssignment {
        self.get(&identity.database).cloned().unwrap_or_default()
    }
}
