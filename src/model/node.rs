//! Upstream node descriptors and the documents they arrive in

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// What kind of manifest item a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Model,
    Seed,
    Source,
    #[serde(other)]
    Other,
}

impl ResourceKind {
    /// Only models and seeds follow the `database__table` naming convention.
    pub fn is_resolvable(self) -> bool {
        matches!(self, Self::Model | Self::Seed)
    }
}

/// A record extracted from an upstream manifest item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeDescriptor {
    #[serde(default)]
    pub unique_id: String,
    #[serde(rename = "fqn")]
    pub fully_qualified_name: Vec<String>,
    #[serde(rename = "resource_type")]
    pub resource_kind: ResourceKind,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(rename = "tags", default)]
    pub raw_tags: BTreeSet<String>,
}

impl NodeDescriptor {
    pub fn new(
        unique_id: impl Into<String>,
        resource_kind: ResourceKind,
        fully_qualified_name: &[&str],
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            fully_qualified_name: fully_qualified_name.iter().map(|s| s.to_string()).collect(),
            resource_kind,
            schema: None,
            raw_tags: BTreeSet::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.raw_tags.insert(tag.into());
        self
    }

    /// The segment carrying the `database__table` name.
    pub fn table_segment(&self) -> Option<&str> {
        self.fully_qualified_name.last().map(String::as_str)
    }

    /// The project folder a model lives under, which names its domain.
    pub fn domain_segment(&self) -> Option<&str> {
        self.fully_qualified_name.get(1).map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.raw_tags.contains(tag)
    }
}

/// `(database, table)` derived deterministically from a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedIdentity {
    pub database: String,
    pub table: String,
}

impl ResolvedIdentity {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// `database.table`, the dataset name used in URNs.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

impl std::fmt::Display for ResolvedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// A transformation project manifest.
///
/// Nodes are held in a `BTreeMap` so iteration order is stable across runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeDescriptor>,
}

impl Manifest {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn with_node(mut self, node: NodeDescriptor) -> Self {
        self.nodes.insert(node.unique_id.clone(), node);
        self
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }
}

/// Metadata about one database from the secondary metadata file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseEntry {
    pub owner: Option<String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// Per-database metadata file.
///
/// Accepts both `{"databases": {db: {...}}}` and a bare `{db: {...}}`.
/// `dc_owner` and `description` are lifted out; every other key is kept as a
/// custom property. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseMetadata {
    databases: BTreeMap<String, DatabaseEntry>,
}

impl DatabaseMetadata {
    pub fn get(&self, database: &str) -> Option<&DatabaseEntry> {
        self.databases.get(database)
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl<'de> Deserialize<'de> for DatabaseMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut root = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let entries = match root.remove("databases") {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => {
                root.insert("databases".to_string(), other);
                root
            }
            None => root,
        };

        let mut databases = BTreeMap::new();
        for (name, entry) in entries {
            let Value::Object(fields) = entry else {
                continue;
            };
            let mut parsed = DatabaseEntry::default();
            for (key, value) in fields {
                let text = match value {
                    Value::String(s) => s,
                    Value::Null => continue,
                    other => other.to_string(),
                };
                if text.is_empty() {
                    continue;
                }
                match key.as_str() {
                    "dc_owner" => parsed.owner = Some(text),
                    "description" => parsed.description = Some(text),
                    _ => {
                        parsed.properties.insert(key, text);
                    }
                }
            }
            databases.insert(name, parsed);
        }
        Ok(Self { databases })
    }
}
