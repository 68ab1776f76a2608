//! dbt manifest + database metadata -> database containers and tables
//!
//! Models are organised by domain: the second fqn segment names it. Seeds
//! have no domain of their own and borrow the domains of the models that
//! share their database. Every database with a resolvable node becomes a
//! container; its tables are placed inside it.

use super::sub_types;
use crate::adapter::{Collected, Source, SourceContext, SourceError};
use crate::fetch::DocumentFetcher;
use crate::mapping::{
    DatabaseDomains, DomainAssignment, DomainResolver, NameParser, ResolutionInput, ResolutionPolicy,
    SplitConvention,
};
use crate::model::{
    Contribution, DatabaseMetadata, EntityKey, Manifest, NodeDescriptor, Platform, ResolvedIdentity,
    ResourceKind,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Manifest-derived facts rank below the curated metadata file.
const MANIFEST_PRIORITY: u8 = 0;
const METADATA_PRIORITY: u8 = 1;

pub struct DbtDatabases {
    platform: Platform,
    manifest_uri: String,
    database_metadata_uri: Option<String>,
    parser: NameParser,
    resolver: DomainResolver,
    display_marker: String,
    documents: Arc<dyn DocumentFetcher>,
}

/// A node that survived parsing, with the domain it resolved to.
struct ResolvedNode<'a> {
    node: &'a NodeDescriptor,
    identity: ResolvedIdentity,
    domains: DomainAssignment,
}

impl DbtDatabases {
    pub const ID: &'static str = "dbt";

    pub fn new(
        platform: Platform,
        manifest_uri: impl Into<String>,
        documents: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            platform,
            manifest_uri: manifest_uri.into(),
            database_metadata_uri: None,
            parser: NameParser::default(),
            resolver: DomainResolver::new(ResolutionPolicy::first_match()),
            display_marker: crate::mapping::DISPLAY_MARKER.to_string(),
            documents,
        }
    }

    pub fn from_context(context: &SourceContext) -> Result<Self, SourceError> {
        let config = &context.config;
        let dbt = config
            .dbt
            .as_ref()
            .ok_or_else(|| SourceError::MissingConfig(Self::ID.to_string()))?;

        let mut source = Self::new(config.platform.clone(), dbt.manifest.clone(), context.documents.clone())
            .with_split_convention(dbt.split_convention)
            .with_resolver(
                DomainResolver::new(ResolutionPolicy::first_match()).with_formatter(config.formatter()),
            )
            .with_display_marker(config.display.marker.clone());
        if let Some(uri) = &dbt.database_metadata {
            source = source.with_database_metadata(uri.clone());
        }
        Ok(source)
    }

    pub fn with_database_metadata(mut self, uri: impl Into<String>) -> Self {
        self.database_metadata_uri = Some(uri.into());
        self
    }

    pub fn with_split_convention(mut self, convention: SplitConvention) -> Self {
        self.parser = NameParser::new(convention);
        self
    }

    pub fn with_resolver(mut self, resolver: DomainResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_display_marker(mut self, marker: impl Into<String>) -> Self {
        self.display_marker = marker.into();
        self
    }

    async fn load_manifest(&self) -> Result<Manifest, SourceError> {
        let document = self.documents.fetch_json(&self.manifest_uri).await?;
        Manifest::from_value(document).map_err(|e| SourceError::document(&self.manifest_uri, e))
    }

    async fn load_database_metadata(&self) -> Result<DatabaseMetadata, SourceError> {
        let Some(uri) = &self.database_metadata_uri else {
            return Ok(DatabaseMetadata::default());
        };
        let document = self.documents.fetch_json(uri).await?;
        DatabaseMetadata::from_value(document).map_err(|e| SourceError::document(uri, e))
    }

    /// Seeds and tagged models are shown in the catalogue.
    fn is_displayable(&self, node: &NodeDescriptor) -> bool {
        node.resource_kind == ResourceKind::Seed || node.has_tag(&self.display_marker)
    }

    /// Parse every model and seed, resolving models first so seeds can
    /// borrow their database's domains.
    fn resolve_nodes<'a>(&self, manifest: &'a Manifest) -> Vec<ResolvedNode<'a>> {
        let mut database_domains = DatabaseDomains::new();
        let mut resolved = Vec::new();

        for node in manifest.nodes().filter(|n| n.resource_kind == ResourceKind::Model) {
            let Some(identity) = self.parser.parse_or_skip(node) else {
                continue;
            };
            let input = node
                .domain_segment()
                .map(ResolutionInput::embedded)
                .unwrap_or_default();
            let domains = self.resolver.resolve(&input);
            database_domains.record(&identity, &domains);
            resolved.push(ResolvedNode {
                node,
                identity,
                domains,
            });
        }

        for node in manifest.nodes().filter(|n| n.resource_kind == ResourceKind::Seed) {
            let Some(identity) = self.parser.parse_or_skip(node) else {
                continue;
            };
            let domains = database_domains.for_seed(&identity);
            if domains.is_empty() {
                debug!(seed = %identity, "no model shares this database; seed gets no domain");
            }
            resolved.push(ResolvedNode {
                node,
                identity,
                domains,
            });
        }

        resolved
    }
}

#[async_trait]
impl Source for DbtDatabases {
    fn id(&self) -> &str {
        Self::ID
    }

    fn platform(&self) -> &Platform {
        &self.platform
    }

    async fn collect(&self) -> Result<Collected, SourceError> {
        let manifest = self.load_manifest().await?;
        let metadata = self.load_database_metadata().await?;

        let resolved = self.resolve_nodes(&manifest);
        let mut collected = Collected::new();
        let mut displayed_databases = BTreeSet::new();
        let mut databases: BTreeMap<&str, DomainAssignment> = BTreeMap::new();

        for ResolvedNode {
            node,
            identity,
            domains,
        } in &resolved
        {
            let displayable = self.is_displayable(node);
            let database = EntityKey::database(&identity.database);
            databases
                .entry(identity.database.as_str())
                .or_default()
                .union_with(domains);
            if displayable {
                displayed_databases.insert(identity.database.as_str());
            }

            collected.push(
                Contribution::for_key(database.clone())
                    .with_priority(MANIFEST_PRIORITY)
                    .with_name(&identity.database)
                    .with_sub_type(sub_types::DATABASE)
                    .with_domains(domains.iter().cloned())
                    .with_tags(domains.iter().cloned())
                    .displayable(displayable),
            );
            collected.push(
                Contribution::for_key(EntityKey::table(identity))
                    .with_priority(MANIFEST_PRIORITY)
                    .with_domains(domains.iter().cloned())
                    .with_parent(database)
                    .displayable(displayable),
            );
        }

        for (database, domains) in &databases {
            match metadata.get(database) {
                Some(entry) => {
                    let mut contribution = Contribution::for_key(EntityKey::database(*database))
                        .with_priority(METADATA_PRIORITY);
                    contribution.owner_identity = entry.owner.clone();
                    contribution.description = entry.description.clone();
                    contribution.custom_properties = entry.properties.clone();
                    collected.push(contribution);
                }
                None if displayed_databases.contains(database) => {
                    warn!(database, "has no database level metadata");
                }
                None => {}
            }
            info!(
                database,
                domains = ?domains.labels,
                "creating database container"
            );
        }

        Ok(collected)
    }
}
