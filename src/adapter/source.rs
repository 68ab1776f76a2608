//! Source trait: the contract each ingestion pipeline implements
//!
//! A source reads its upstream documents and reports what it learned as
//! contributions. It never emits proposals itself: merging, validation and
//! proposal building are shared by every source.

use crate::fetch::FetchError;
use crate::mapping::LabelKind;
use crate::model::{Contribution, Platform};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors that abort a source's collection.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Upstream JSON fetched fine but has the wrong shape
    #[error("malformed document {uri}: {message}")]
    Document { uri: String, message: String },
    #[error("no `{0}` section in config")]
    MissingConfig(String),
    #[error("unknown source `{0}`")]
    UnknownSource(String),
}

impl SourceError {
    pub fn document(uri: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Document {
            uri: uri.into(),
            message: message.to_string(),
        }
    }
}

/// Everything one source learned in one run.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub contributions: Vec<Contribution>,
    /// Labels taken from static configuration; each must already exist in
    /// the catalogue before anything is emitted.
    pub configured_labels: BTreeMap<LabelKind, BTreeSet<String>>,
    /// Properties stamped onto every record at finalize
    pub static_properties: BTreeMap<String, String>,
    /// Ownership type for every owner this source names
    pub ownership_type: Option<String>,
    /// The contributions add to entities another run created; their
    /// current catalogue state is merged in underneath before building
    pub extends_existing: bool,
}

impl Collected {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, contribution: Contribution) {
        self.contributions.push(contribution);
    }

    pub fn require_labels<I, S>(&mut self, kind: LabelKind, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configured_labels
            .entry(kind)
            .or_default()
            .extend(labels.into_iter().map(Into::into));
    }

    pub fn with_static_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_ownership_type(mut self, ownership_type: impl Into<String>) -> Self {
        self.ownership_type = Some(ownership_type.into());
        self
    }

    pub fn extending_existing(mut self) -> Self {
        self.extends_existing = true;
        self
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}

/// An ingestion pipeline's upstream half.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable name used by the registry and in logs
    fn id(&self) -> &str;

    /// Platform the produced entities belong to
    fn platform(&self) -> &Platform;

    /// Read upstream documents and describe every entity found.
    async fn collect(&self) -> Result<Collected, SourceError>;
}
