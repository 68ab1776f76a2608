//! External collaborators: document stores, JSON APIs, catalogue label lists
//!
//! Each is a trait so sources and the validator can be driven by in-memory
//! fakes in tests. Retries and timeouts belong to the implementations.

mod documents;
mod http;
mod labels;

pub use documents::{DocumentFetcher, DocumentRouter, LocalFetcher};
pub use http::{paginate, HttpClient, JsonApi, PAGE_SIZE};
pub use labels::{CatalogueReader, LabelSnapshot};

use thiserror::Error;

/// Why an upstream document or API response could not be obtained.
///
/// Always fatal for the run that needed it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("HTTP request to {url} failed: {message}")]
    Http {
        url: String,
        status: Option<u16>,
        message: String,
    },
    #[error("cannot parse {uri}: {message}")]
    Parse { uri: String, message: String },
    #[error("I/O error reading {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub(crate) fn parse(uri: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            uri: uri.into(),
            message: err.to_string(),
        }
    }
}
