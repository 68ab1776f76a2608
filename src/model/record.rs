//! Merged entity records and the partial contributions that build them

use super::node::ResolvedIdentity;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Which catalogue entity a record describes.
///
/// Ordering is part of the contract: containers sort before the datasets
/// and charts they hold, which keeps emission order stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EntityKey {
    /// A grouping entity: a database or a publication collection
    Container(String),
    /// A table (`database.table`) or a single publication
    Dataset(String),
    Chart(String),
    Dashboard(String),
}

impl EntityKey {
    pub fn database(database: impl Into<String>) -> Self {
        Self::Container(database.into())
    }

    pub fn table(identity: &ResolvedIdentity) -> Self {
        Self::Dataset(identity.qualified_name())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Container(n) | Self::Dataset(n) | Self::Chart(n) | Self::Dashboard(n) => n,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container(n) => write!(f, "container:{}", n),
            Self::Dataset(n) => write!(f, "dataset:{}", n),
            Self::Chart(n) => write!(f, "chart:{}", n),
            Self::Dashboard(n) => write!(f, "dashboard:{}", n),
        }
    }
}

/// What one source knows about one entity.
///
/// Every field is optional or a collection; the merger decides how it
/// combines with what earlier sources said.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub key: EntityKey,
    pub priority: u8,
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_identity: Option<String>,
    pub external_url: Option<String>,
    pub qualified_name: Option<String>,
    pub sub_type: Option<String>,
    pub last_modified: Option<i64>,
    pub domain_labels: BTreeSet<String>,
    pub display_tags: BTreeSet<String>,
    pub custom_properties: BTreeMap<String, String>,
    pub parent: Option<EntityKey>,
    pub members: BTreeSet<EntityKey>,
    /// The entity qualifies for the visible-in-catalogue marker
    pub displayable: bool,
}

impl Contribution {
    pub fn for_key(key: EntityKey) -> Self {
        Self {
            key,
            priority: 0,
            name: None,
            description: None,
            owner_identity: None,
            external_url: None,
            qualified_name: None,
            sub_type: None,
            last_modified: None,
            domain_labels: BTreeSet::new(),
            display_tags: BTreeSet::new(),
            custom_properties: BTreeMap::new(),
            parent: None,
            members: BTreeSet::new(),
            displayable: false,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_identity = Some(owner.into());
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = Some(url.into());
        self
    }

    pub fn with_qualified_name(mut self, name: impl Into<String>) -> Self {
        self.qualified_name = Some(name.into());
        self
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    pub fn with_last_modified(mut self, millis: i64) -> Self {
        self.last_modified = Some(millis);
        self
    }

    pub fn with_domains<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.display_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent: EntityKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_member(mut self, member: EntityKey) -> Self {
        self.members.insert(member);
        self
    }

    pub fn displayable(mut self, displayable: bool) -> Self {
        self.displayable = displayable;
        self
    }
}

/// Priorities at which each scalar field was last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct FieldPriorities {
    pub name: u8,
    pub description: u8,
    pub owner: u8,
    pub external_url: u8,
    pub qualified_name: u8,
    pub sub_type: u8,
    pub last_modified: u8,
    pub parent: u8,
}

/// One entity as seen by every source in a run.
///
/// Created the first time a source mentions its key, updated by each later
/// contribution, then finalized once before it reaches the proposal builder.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntityRecord {
    pub key: EntityKey,
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner_identity: Option<String>,
    pub external_url: Option<String>,
    pub qualified_name: Option<String>,
    pub sub_type: Option<String>,
    pub last_modified: Option<i64>,
    pub domain_labels: BTreeSet<String>,
    pub display_tags: BTreeSet<String>,
    pub custom_properties: BTreeMap<String, String>,
    pub parent: Option<EntityKey>,
    pub members: BTreeSet<EntityKey>,
    pub displayable: bool,
    pub(crate) priorities: FieldPriorities,
    pub(crate) finalized: bool,
}

impl MergedEntityRecord {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            name: None,
            description: None,
            owner_identity: None,
            external_url: None,
            qualified_name: None,
            sub_type: None,
            last_modified: None,
            domain_labels: BTreeSet::new(),
            display_tags: BTreeSet::new(),
            custom_properties: BTreeMap::new(),
            parent: None,
            members: BTreeSet::new(),
            displayable: false,
            priorities: FieldPriorities::default(),
            finalized: false,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Name shown in the catalogue, falling back to the key's own name.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.key.name())
    }
}
