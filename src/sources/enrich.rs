//! Curated enrichment of existing containers
//!
//! Containers created by another pipeline get an owner, subject-area tags,
//! a description and custom properties from configuration. Contributions
//! carry the highest priority so curated text beats anything upstream,
//! and are merged over the container's current catalogue state so that
//! anything left unconfigured keeps its value.

use crate::adapter::{Collected, Source, SourceContext, SourceError};
use crate::config::EnrichContainersConfig;
use crate::mapping::LabelKind;
use crate::model::{Contribution, EntityKey, Platform};
use async_trait::async_trait;
use tracing::info;

const ENRICH_PRIORITY: u8 = 2;

pub struct EnrichContainers {
    config: EnrichContainersConfig,
    platform: Platform,
}

impl EnrichContainers {
    pub const ID: &'static str = "enrich_containers";

    pub fn new(config: EnrichContainersConfig, platform: Platform) -> Self {
        let platform = config.platform.clone().unwrap_or(platform);
        Self { config, platform }
    }

    pub fn from_context(context: &SourceContext) -> Result<Self, SourceError> {
        let config = context
            .config
            .enrich_containers
            .clone()
            .ok_or_else(|| SourceError::MissingConfig(Self::ID.to_string()))?;
        Ok(Self::new(config, context.config.platform.clone()))
    }

    fn contribution(&self, container: &str) -> Contribution {
        let mut contribution = Contribution::for_key(EntityKey::database(container))
            .with_priority(ENRICH_PRIORITY)
            .with_tags(self.config.subject_areas.iter().cloned())
            .displayable(true);
        if let Some(custodian) = &self.config.data_custodian {
            contribution = contribution.with_owner(custodian);
        }
        if let Some(description) = &self.config.description {
            contribution = contribution.with_description(description);
        }
        for (key, value) in &self.config.properties {
            contribution = contribution.with_property(key, value);
        }
        contribution
    }
}

#[async_trait]
impl Source for EnrichContainers {
    fn id(&self) -> &str {
        Self::ID
    }

    fn platform(&self) -> &Platform {
        &self.platform
    }

    async fn collect(&self) -> Result<Collected, SourceError> {
        let mut collected = Collected::new()
            .extending_existing()
            .with_ownership_type(&self.config.ownership_type);
        for container in &self.config.containers {
            info!(container = %container, "enriching container");
            collected.push(self.contribution(container));
        }
        collected.require_labels(LabelKind::Tag, self.config.subject_areas.iter().cloned());
        Ok(collected)
    }
}
