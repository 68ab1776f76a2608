//! Shared fixtures for pipeline integration tests
//!
//! Upstream APIs are served by [`FakeApi`]; local documents live in a
//! `tempfile` directory; the catalogue is the real `InMemoryCatalogue`.

#![allow(dead_code)]

use async_trait::async_trait;
use catalogue_ingest::adapter::{InMemoryCatalogue, SourceContext};
use catalogue_ingest::config::IngestConfig;
use catalogue_ingest::fetch::{FetchError, JsonApi, LocalFetcher};
use catalogue_ingest::model::{Aspect, AspectKind};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory JSON API. Plain routes answer any request to their URL;
/// search routes slice their items by the `start`/`count` parameters.
#[derive(Default)]
pub struct FakeApi {
    routes: BTreeMap<String, Value>,
    searches: BTreeMap<String, Vec<Value>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, url: &str, body: Value) -> Self {
        self.routes.insert(url.to_string(), body);
        self
    }

    pub fn with_search(mut self, url: &str, items: Vec<Value>) -> Self {
        self.searches.insert(url.to_string(), items);
        self
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn param(params: &[(String, String)], name: &str) -> Option<usize> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .and_then(|(_, v)| v.parse().ok())
}

#[async_trait]
impl JsonApi for FakeApi {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(items) = self.searches.get(url) {
            let start = param(params, "start").unwrap_or(0).min(items.len());
            let count = param(params, "count").unwrap_or(items.len());
            let end = (start + count).min(items.len());
            return Ok(json!({ "total": items.len(), "results": items[start..end].to_vec() }));
        }
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    write_file(dir, name, &serde_json::to_string_pretty(value).unwrap())
}

/// Context whose documents are read from `root` and whose API is `api`.
pub fn context(config: IngestConfig, root: &Path, api: Arc<FakeApi>) -> SourceContext {
    SourceContext::new(Arc::new(config), Arc::new(LocalFetcher::new(root)), api)
}

/// dbt manifest with one displayed model, one seed sharing its database,
/// one unrelated seed and one malformed model.
pub fn dbt_manifest() -> Value {
    json!({
        "nodes": {
            "model.mojap.prison__table1": {
                "unique_id": "model.mojap.prison__table1",
                "fqn": ["mojap", "prison", "prison__table1"],
                "resource_type": "model",
                "schema": "prison_database",
                "tags": ["dc_display_in_catalogue"]
            },
            "model.mojap.prison__table2": {
                "unique_id": "model.mojap.prison__table2",
                "fqn": ["mojap", "prison", "prison__table2"],
                "resource_type": "model",
                "schema": "prison_database",
                "tags": []
            },
            "seed.mojap.prison__codes": {
                "unique_id": "seed.mojap.prison__codes",
                "fqn": ["mojap", "seeds", "prison__codes"],
                "resource_type": "seed",
                "schema": "prison_database",
                "tags": []
            },
            "seed.mojap.ref__postcodes": {
                "unique_id": "seed.mojap.ref__postcodes",
                "fqn": ["mojap", "seeds", "ref__postcodes"],
                "resource_type": "seed",
                "schema": "ref_database",
                "tags": []
            },
            "model.mojap.nounderscore": {
                "unique_id": "model.mojap.nounderscore",
                "fqn": ["mojap", "courts", "nounderscore"],
                "resource_type": "model",
                "schema": "courts_database",
                "tags": ["dc_display_in_catalogue"]
            }
        }
    })
}

pub fn database_metadata() -> Value {
    json!({
        "databases": {
            "prison_database": {
                "dc_owner": "a.b@justice.gov.uk",
                "description": "Prison data",
                "dc_slack_channel": "#prison"
            }
        }
    })
}

pub fn tag_set(catalogue: &InMemoryCatalogue, urn: &str) -> Vec<String> {
    match catalogue.latest(urn, AspectKind::TagSet) {
        Some(Aspect::TagSet { tags }) => tags,
        _ => Vec::new(),
    }
}

pub fn domain_set(catalogue: &InMemoryCatalogue, urn: &str) -> Vec<String> {
    match catalogue.latest(urn, AspectKind::DomainSet) {
        Some(Aspect::DomainSet { domains }) => domains,
        _ => Vec::new(),
    }
}
