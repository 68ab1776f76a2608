//! Read access to the catalogue's existing labels

use super::FetchError;
use crate::mapping::LabelKind;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// `list_all_labels_of_kind` against a live or recorded catalogue.
#[async_trait]
pub trait CatalogueReader: Send + Sync {
    async fn list_labels(&self, kind: LabelKind) -> Result<BTreeSet<String>, FetchError>;
}

/// Label lists captured ahead of a run, e.g. exported from the catalogue.
///
/// ```yaml
/// domains: [Prison, Probation]
/// tags: [Courts and tribunals]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelSnapshot {
    #[serde(default)]
    pub domains: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl LabelSnapshot {
    pub fn new<D, T>(domains: D, tags: T) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, FetchError> {
        let uri = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(uri.clone()),
            _ => FetchError::Io {
                uri: uri.clone(),
                source,
            },
        })?;
        serde_yaml::from_str(&text).map_err(|e| FetchError::parse(uri, e))
    }
}

#[async_trait]
impl CatalogueReader for LabelSnapshot {
    async fn list_labels(&self, kind: LabelKind) -> Result<BTreeSet<String>, FetchError> {
        Ok(match kind {
            LabelKind::Domain => self.domains.clone(),
            LabelKind::Tag => self.tags.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_serves_labels_by_kind() {
        let snapshot: LabelSnapshot =
            serde_yaml::from_str("domains: [Prison]\ntags: [Courts, Prison]\n").unwrap();
        assert_eq!(snapshot.list_labels(LabelKind::Domain).await.unwrap().len(), 1);
        assert_eq!(snapshot.list_labels(LabelKind::Tag).await.unwrap().len(), 2);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabelSnapshot::load(&dir.path().join("labels.yaml")).unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
