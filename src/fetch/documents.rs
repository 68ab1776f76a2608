//! Whole-document fetch for manifests and metadata files

use super::{FetchError, HttpClient};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetch one JSON document by URI.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError>;
}

/// Reads documents from a local directory.
///
/// `s3://bucket/key` maps to `<root>/bucket/key`, which lets a synced copy
/// of a bucket stand in for the bucket itself. Relative paths resolve
/// against the root; absolute paths and `file://` URIs are read as given.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, uri: &str) -> PathBuf {
        if let Some(rest) = uri.strip_prefix("s3://") {
            return self.root.join(rest);
        }
        if let Some(rest) = uri.strip_prefix("file://") {
            return PathBuf::from(rest);
        }
        let path = Path::new(uri);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl DocumentFetcher for LocalFetcher {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        let path = self.resolve(uri);
        debug!(uri, path = %path.display(), "reading document");

        let text = tokio::fs::read_to_string(&path).await.map_err(|source| match source.kind() {
            ErrorKind::NotFound => FetchError::NotFound(uri.to_string()),
            ErrorKind::PermissionDenied => FetchError::AccessDenied(uri.to_string()),
            _ => FetchError::Io {
                uri: uri.to_string(),
                source,
            },
        })?;
        serde_json::from_str(&text).map_err(|e| FetchError::parse(uri, e))
    }
}

/// Sends `http(s)://` URIs to an HTTP client and everything else to disk.
pub struct DocumentRouter {
    local: LocalFetcher,
    http: Option<HttpClient>,
}

impl DocumentRouter {
    pub fn new(local: LocalFetcher) -> Self {
        Self { local, http: None }
    }

    pub fn with_http(mut self, client: HttpClient) -> Self {
        self.http = Some(client);
        self
    }
}

#[async_trait]
impl DocumentFetcher for DocumentRouter {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        let is_http = uri.starts_with("http://") || uri.starts_with("https://");
        match (&self.http, is_http) {
            (Some(client), true) => client.fetch_json(uri).await,
            (None, true) => Err(FetchError::Http {
                url: uri.to_string(),
                status: None,
                message: "no HTTP client configured".to_string(),
            }),
            (_, false) => self.local.fetch_json(uri).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_uri_maps_under_root() {
        let fetcher = LocalFetcher::new("/data");
        assert_eq!(
            fetcher.resolve("s3://bucket/path/manifest.json"),
            PathBuf::from("/data/bucket/path/manifest.json")
        );
        assert_eq!(fetcher.resolve("meta.json"), PathBuf::from("/data/meta.json"));
        assert_eq!(fetcher.resolve("/abs/meta.json"), PathBuf::from("/abs/meta.json"));
    }

    #[tokio::test]
    async fn reads_and_parses_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bucket")).unwrap();
        std::fs::write(dir.path().join("bucket/doc.json"), r#"{"nodes": {}}"#).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let fetcher = LocalFetcher::new(dir.path());
        let doc = fetcher.fetch_json("s3://bucket/doc.json").await.unwrap();
        assert!(doc["nodes"].is_object());

        assert!(matches!(
            fetcher.fetch_json("s3://bucket/missing.json").await,
            Err(FetchError::NotFound(_))
        ));
        assert!(matches!(
            fetcher.fetch_json("bad.json").await,
            Err(FetchError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn router_without_http_client_rejects_urls() {
        let router = DocumentRouter::new(LocalFetcher::new("."));
        let err = router.fetch_json("https://example.org/doc.json").await.unwrap_err();
        assert!(matches!(err, FetchError::Http { status: None, .. }));
    }
}
