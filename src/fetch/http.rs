//! JSON-over-HTTP client and the `start`/`count` pagination loop

use super::{DocumentFetcher, FetchError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Largest page the publications search API serves.
pub const PAGE_SIZE: usize = 1500;

/// `GET url?params` returning parsed JSON.
#[async_trait]
pub trait JsonApi: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError>;
}

/// reqwest-backed [`JsonApi`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("catalogue-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                status: None,
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl JsonApi for HttpClient {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::AccessDenied(url.to_string()))
            }
            _ => {}
        }

        let text = response.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| FetchError::parse(url, e))
    }
}

#[async_trait]
impl DocumentFetcher for HttpClient {
    async fn fetch_json(&self, uri: &str) -> Result<Value, FetchError> {
        self.get_json(uri, &[]).await
    }
}

/// Collect every item of a paginated search.
///
/// Each page is requested with `start` and `count` appended to `params`;
/// `results_key` names the array in the response and `total` the overall
/// size. Stops once `total` items are collected, or on an empty page.
pub async fn paginate<A>(
    api: &A,
    url: &str,
    params: &[(String, String)],
    page_size: usize,
    results_key: &str,
) -> Result<Vec<Value>, FetchError>
where
    A: JsonApi + ?Sized,
{
    let page_size = page_size.max(1);
    let mut start = 0usize;
    let mut collected = Vec::new();

    loop {
        let mut page_params = params.to_vec();
        page_params.push(("count".to_string(), page_size.to_string()));
        page_params.push(("start".to_string(), start.to_string()));

        let page = api.get_json(url, &page_params).await?;
        let total = page
            .get("total")
            .and_then(Value::as_u64)
            .ok_or_else(|| FetchError::parse(url, "response has no `total`"))? as usize;
        let results = match page.get(results_key) {
            Some(Value::Array(items)) => items.clone(),
            _ => {
                return Err(FetchError::parse(
                    url,
                    format!("response has no `{}` array", results_key),
                ))
            }
        };

        let received = results.len();
        collected.extend(results);
        debug!(url, start, received, collected = collected.len(), total, "fetched page");

        if collected.len() >= total {
            break;
        }
        if received == 0 {
            warn!(url, collected = collected.len(), total, "empty page before total reached");
            break;
        }
        start += page_size;
    }

    Ok(collected)
}
