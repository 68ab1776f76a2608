//! Source registry: pipeline name -> constructor
//!
//! Lookup is an explicit table. Unknown names are an error; nothing is
//! resolved by building identifiers out of strings.

use super::source::{Source, SourceError};
use crate::config::IngestConfig;
use crate::fetch::{DocumentFetcher, JsonApi};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a source constructor gets to build from.
#[derive(Clone)]
pub struct SourceContext {
    pub config: Arc<IngestConfig>,
    pub documents: Arc<dyn DocumentFetcher>,
    pub api: Arc<dyn JsonApi>,
}

impl SourceContext {
    pub fn new(
        config: Arc<IngestConfig>,
        documents: Arc<dyn DocumentFetcher>,
        api: Arc<dyn JsonApi>,
    ) -> Self {
        Self {
            config,
            documents,
            api,
        }
    }
}

pub type SourceFactory = fn(&SourceContext) -> Result<Box<dyn Source>, SourceError>;

/// Named source constructors.
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register a constructor. A second registration under the same name
    /// replaces the first.
    pub fn register(&mut self, name: impl Into<String>, factory: SourceFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn with(mut self, name: impl Into<String>, factory: SourceFactory) -> Self {
        self.register(name, factory);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str, context: &SourceContext) -> Result<Box<dyn Source>, SourceError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SourceError::UnknownSource(name.to_string()))?;
        factory(context)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
