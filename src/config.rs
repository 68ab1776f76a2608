//! Run configuration loaded from one YAML document
//!
//! Static mapping tables live here and are handed to sources by reference.
//! Nothing in the crate reads configuration from ambient state.

use crate::mapping::{DomainNameFormatter, LabelMapping, MetadataMerger, SplitConvention, DEFAULT_ACRONYMS, DISPLAY_MARKER};
use crate::model::Platform;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub formatter: FormatterConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Directory that `s3://bucket/key` and relative document paths resolve
    /// against when documents are read from disk.
    #[serde(default)]
    pub documents_root: Option<PathBuf>,
    #[serde(default)]
    pub dbt: Option<DbtConfig>,
    #[serde(default)]
    pub publications: Option<PublicationsConfig>,
    #[serde(default)]
    pub justice_data: Option<JusticeDataConfig>,
    #[serde(default)]
    pub enrich_containers: Option<EnrichContainersConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormatterConfig {
    #[serde(default = "default_acronyms")]
    pub acronyms: Vec<String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            acronyms: default_acronyms(),
        }
    }
}

fn default_acronyms() -> Vec<String> {
    DEFAULT_ACRONYMS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

fn default_marker() -> String {
    DISPLAY_MARKER.to_string()
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["athena_cadet".to_string()]
}

/// dbt manifest + database metadata pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct DbtConfig {
    pub manifest: String,
    #[serde(default)]
    pub database_metadata: Option<String>,
    #[serde(default)]
    pub split_convention: SplitConvention,
}

/// Per-collection metadata keyed by collection slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectionMapping {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub subject_areas: Vec<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// Search API filters passed through as query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicationFilters {
    #[serde(default)]
    pub filter_organisations: Vec<String>,
    #[serde(default)]
    pub filter_content_store_document_type: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicationsConfig {
    pub base_url: String,
    #[serde(default)]
    pub default_contact_email: Option<String>,
    #[serde(default)]
    pub collections_to_exclude: Vec<String>,
    #[serde(default)]
    pub access_requirements: String,
    #[serde(default)]
    pub filters: PublicationFilters,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionMapping>,
    #[serde(default = "publications_platform")]
    pub platform: Platform,
}

fn publications_platform() -> Platform {
    Platform::new("GOV.UK").with_instance("ministry-of-justice-publications")
}

impl PublicationsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_contact_email: None,
            collections_to_exclude: Vec::new(),
            access_requirements: String::new(),
            filters: PublicationFilters::default(),
            collections: BTreeMap::new(),
            platform: publications_platform(),
        }
    }

    /// Slug -> domain table for the domain resolver.
    pub fn domain_mapping(&self) -> LabelMapping {
        self.collections
            .iter()
            .filter_map(|(slug, m)| m.domain.as_ref().map(|d| (slug, d)))
            .fold(LabelMapping::new(), |acc, (slug, domain)| {
                acc.with_entry(slug.clone(), [domain.clone()])
            })
    }

    /// Slug -> subject areas table for the subject-area resolver.
    pub fn subject_area_mapping(&self) -> LabelMapping {
        self.collections
            .iter()
            .filter(|(_, m)| !m.subject_areas.is_empty())
            .fold(LabelMapping::new(), |acc, (slug, m)| {
                acc.with_entry(slug.clone(), m.subject_areas.clone())
            })
    }

    pub fn contact_email(&self, slug: &str) -> Option<&str> {
        self.collections
            .get(slug)
            .and_then(|m| m.contact_email.as_deref())
            .or(self.default_contact_email.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JusticeDataConfig {
    pub base_url: String,
    #[serde(default)]
    pub default_owner_email: Option<String>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    /// Chart tree node id -> raw domain name
    #[serde(default)]
    pub domains: LabelMapping,
    #[serde(default = "justice_data_platform")]
    pub platform: Platform,
}

fn justice_data_platform() -> Platform {
    Platform::new("justice-data")
}

impl JusticeDataConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_owner_email: None,
            exclude_ids: Vec::new(),
            domains: LabelMapping::new(),
            platform: justice_data_platform(),
        }
    }

    /// Public site the chart permalinks are relative to.
    pub fn web_url(&self) -> &str {
        let trimmed = self.base_url.trim_end_matches('/');
        trimmed.strip_suffix("/api").unwrap_or(trimmed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichContainersConfig {
    pub containers: Vec<String>,
    #[serde(default)]
    pub data_custodian: Option<String>,
    #[serde(default = "default_ownership_type")]
    pub ownership_type: String,
    #[serde(default)]
    pub subject_areas: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

pub fn default_ownership_type() -> String {
    "DATAOWNER".to_string()
}

impl IngestConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.platform.name.trim().is_empty() {
            return Err(ConfigError::Invalid("platform name is empty".into()));
        }
        if let Some(dbt) = &self.dbt {
            if dbt.manifest.trim().is_empty() {
                return Err(ConfigError::Invalid("dbt.manifest is empty".into()));
            }
        }
        if let Some(publications) = &self.publications {
            if publications.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid("publications.base_url is empty".into()));
            }
        }
        if let Some(justice_data) = &self.justice_data {
            if justice_data.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid("justice_data.base_url is empty".into()));
            }
        }
        if let Some(enrich) = &self.enrich_containers {
            if enrich.containers.is_empty() {
                return Err(ConfigError::Invalid("enrich_containers.containers is empty".into()));
            }
        }
        Ok(())
    }

    pub fn formatter(&self) -> DomainNameFormatter {
        DomainNameFormatter::with_acronyms(&self.formatter.acronyms)
    }

    /// A merger carrying the display settings, scoped to `platform`.
    pub fn merger(&self, platform: &Platform) -> MetadataMerger {
        let merger = MetadataMerger::new()
            .with_display_marker(self.display.marker.clone())
            .with_exclude_patterns(self.display.exclude_patterns.clone());
        match &platform.instance {
            Some(instance) => merger.with_scope(instance.clone()),
            None => merger,
        }
    }

    pub fn documents_root(&self) -> PathBuf {
        self.documents_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
