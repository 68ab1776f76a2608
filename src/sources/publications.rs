//! Statistical publications from the GOV.UK search and content APIs
//!
//! Publication collections become containers; each publication is a
//! dataset placed in its first collection. The collection slug keys the
//! configured domain, subject areas and team contact email.

use super::{join_url, rfc3339_millis, sub_types};
use crate::adapter::{Collected, Source, SourceContext, SourceError};
use crate::config::PublicationsConfig;
use crate::fetch::{paginate, JsonApi, PAGE_SIZE};
use crate::mapping::{
    DomainAssignment, DomainNameFormatter, DomainResolver, LabelKind, LabelStyle, ResolutionInput,
    ResolutionPolicy,
};
use crate::model::{Contribution, EntityKey, Platform};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

const SEARCH_FIELDS: [&str; 6] = [
    "description",
    "document_collections",
    "link",
    "public_timestamp",
    "title",
    "first_published_at",
];

#[derive(Debug, Clone, Deserialize)]
struct CollectionRef {
    title: String,
    slug: String,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PublicationDoc {
    #[serde(rename = "_id")]
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    public_timestamp: Option<String>,
    #[serde(default)]
    document_collections: Vec<CollectionRef>,
}

impl PublicationDoc {
    /// Last path segment of `_id`, the stable dataset name.
    fn dataset_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ContentDoc {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public_updated_at: Option<String>,
}

pub struct Publications {
    config: PublicationsConfig,
    api: Arc<dyn JsonApi>,
    domains: DomainResolver,
    subject_areas: DomainResolver,
}

impl Publications {
    pub const ID: &'static str = "publications";

    pub fn new(config: PublicationsConfig, api: Arc<dyn JsonApi>) -> Self {
        Self::with_formatter(config, api, DomainNameFormatter::default())
    }

    pub fn with_formatter(
        config: PublicationsConfig,
        api: Arc<dyn JsonApi>,
        formatter: DomainNameFormatter,
    ) -> Self {
        let domains = DomainResolver::new(ResolutionPolicy::first_match())
            .with_mapping(config.domain_mapping())
            .with_formatter(formatter);
        let subject_areas = DomainResolver::new(ResolutionPolicy::union().with_style(LabelStyle::SubjectArea))
            .with_mapping(config.subject_area_mapping());
        Self {
            config,
            api,
            domains,
            subject_areas,
        }
    }

    pub fn from_context(context: &SourceContext) -> Result<Self, SourceError> {
        let config = context
            .config
            .publications
            .clone()
            .ok_or_else(|| SourceError::MissingConfig(Self::ID.to_string()))?;
        Ok(Self::with_formatter(config, context.api.clone(), context.config.formatter()))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    fn search_params(&self) -> Vec<(String, String)> {
        let filters = &self.config.filters;
        let mut params: Vec<(String, String)> = SEARCH_FIELDS
            .iter()
            .map(|f| ("fields".to_string(), f.to_string()))
            .collect();
        params.extend(
            filters
                .filter_organisations
                .iter()
                .map(|o| ("filter_organisations".to_string(), o.clone())),
        );
        params.extend(
            filters
                .filter_content_store_document_type
                .iter()
                .map(|t| ("filter_content_store_document_type".to_string(), t.clone())),
        );
        params
    }

    async fn list_publications(&self) -> Result<Vec<PublicationDoc>, SourceError> {
        let url = self.api_url("search.json");
        let results = paginate(self.api.as_ref(), &url, &self.search_params(), PAGE_SIZE, "results").await?;
        results
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| SourceError::document(&url, e)))
            .collect()
    }

    async fn fetch_content(&self, link: &str) -> Result<ContentDoc, SourceError> {
        let url = self.api_url(&format!("content/{}", link.trim_start_matches('/')));
        let value: Value = self.api.get_json(&url, &[]).await?;
        serde_json::from_value(value).map_err(|e| SourceError::document(&url, e))
    }

    fn is_excluded(&self, slug: &str) -> bool {
        self.config.collections_to_exclude.iter().any(|s| s == slug)
    }

    /// Domain and subject-area labels for a collection slug.
    fn labels_for(&self, slug: &str) -> (DomainAssignment, DomainAssignment) {
        let input = ResolutionInput::by_id(slug);
        (self.domains.resolve(&input), self.subject_areas.resolve(&input))
    }

    fn team_email(&self, slug: Option<&str>) -> Option<String> {
        let email = match slug {
            Some(slug) => self.config.contact_email(slug),
            None => self.config.default_contact_email.as_deref(),
        };
        email.map(str::to_string)
    }

    async fn collection_contribution(&self, collection: &CollectionRef) -> Result<Contribution, SourceError> {
        let (domains, subject_areas) = self.labels_for(&collection.slug);
        let mut contribution = Contribution::for_key(EntityKey::Container(collection.title.clone()))
            .with_name(&collection.title)
            .with_qualified_name(&collection.slug)
            .with_sub_type(sub_types::PUBLICATION_COLLECTION)
            .with_domains(domains.iter().cloned())
            .with_tags(domains.iter().cloned())
            .with_tags(subject_areas.iter().cloned())
            .displayable(true);

        match &collection.link {
            Some(link) => {
                let content = self.fetch_content(link).await?;
                if let Some(url) = join_url(&self.config.base_url, link) {
                    contribution = contribution.with_external_url(url);
                }
                if let Some(description) = content.description {
                    contribution = contribution.with_description(description);
                }
                if let Some(millis) = content.public_updated_at.as_deref().and_then(rfc3339_millis) {
                    contribution = contribution.with_last_modified(millis);
                }
            }
            None => error!(slug = %collection.slug, "collection has no link"),
        }

        if let Some(email) = self.team_email(Some(&collection.slug)) {
            contribution = contribution.with_property("dc_team_email", email);
        }
        Ok(contribution)
    }

    fn publication_contribution(&self, publication: &PublicationDoc) -> Contribution {
        let mut contribution = Contribution::for_key(EntityKey::Dataset(publication.dataset_name().to_string()))
            .with_name(&publication.title)
            .with_qualified_name(&publication.id)
            .with_sub_type(sub_types::PUBLICATION_DATASET)
            .displayable(true);

        if let Some(description) = &publication.description {
            contribution = contribution.with_description(description);
        }
        if let Some(url) = publication
            .link
            .as_deref()
            .and_then(|link| join_url(&self.config.base_url, link))
        {
            contribution = contribution.with_external_url(url);
        }
        if let Some(millis) = publication.public_timestamp.as_deref().and_then(rfc3339_millis) {
            contribution = contribution.with_last_modified(millis);
        }

        // Only the first collection is used; a publication in several
        // collections is placed in one of them.
        let parent = publication
            .document_collections
            .first()
            .filter(|c| !self.is_excluded(&c.slug));

        match parent {
            Some(collection) => {
                let (domains, subject_areas) = self.labels_for(&collection.slug);
                contribution = contribution
                    .with_parent(EntityKey::Container(collection.title.clone()))
                    .with_domains(domains.iter().cloned())
                    .with_tags(domains.iter().cloned())
                    .with_tags(subject_areas.iter().cloned());
                if let Some(email) = self.team_email(Some(&collection.slug)) {
                    contribution = contribution.with_property("dc_team_email", email);
                }
            }
            None => {
                if let Some(email) = self.team_email(None) {
                    contribution = contribution.with_property("dc_team_email", email);
                }
            }
        }
        contribution
    }
}

#[async_trait]
impl Source for Publications {
    fn id(&self) -> &str {
        Self::ID
    }

    fn platform(&self) -> &Platform {
        &self.config.platform
    }

    async fn collect(&self) -> Result<Collected, SourceError> {
        let publications = self.list_publications().await?;
        info!(count = publications.len(), "fetched publications");

        let collections: BTreeMap<&str, &CollectionRef> = publications
            .iter()
            .flat_map(|p| &p.document_collections)
            .filter(|c| !self.is_excluded(&c.slug))
            .map(|c| (c.slug.as_str(), c))
            .collect();

        let mut collected = Collected::new()
            .with_static_property("security_classification", "Official")
            .with_static_property("dc_access_requirements", self.config.access_requirements.clone());

        for collection in collections.values() {
            info!(collection = %collection.title, "creating container for collection");
            collected.push(self.collection_contribution(collection).await?);
        }
        for publication in &publications {
            collected.push(self.publication_contribution(publication));
        }

        collected.require_labels(
            LabelKind::Domain,
            self.domains
                .mapping()
                .all_labels()
                .iter()
                .filter_map(|l| self.domains.canonical(l)),
        );
        collected.require_labels(LabelKind::Tag, self.subject_areas.mapping().all_labels());
        Ok(collected)
    }
}
