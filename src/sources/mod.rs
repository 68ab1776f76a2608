//! Ingestion sources, one per upstream system
//!
//! Each turns upstream documents into contributions for the shared
//! merge/validate/build pipeline.

mod dbt;
mod enrich;
mod justice_data;
mod publications;

pub use dbt::DbtDatabases;
pub use enrich::EnrichContainers;
pub use justice_data::JusticeData;
pub use publications::Publications;

use crate::adapter::{Source, SourceContext, SourceError, SourceRegistry};
use chrono::{DateTime, NaiveDate};
use reqwest::Url;
use tracing::warn;

/// Entity subtypes shown by the catalogue front end.
pub mod sub_types {
    pub const DATABASE: &str = "Database";
    pub const PUBLICATION_COLLECTION: &str = "Publication collection";
    pub const PUBLICATION_DATASET: &str = "Publication dataset";
}

/// Registry with every built-in source.
pub fn default_registry() -> SourceRegistry {
    SourceRegistry::new()
        .with(DbtDatabases::ID, dbt_factory)
        .with(Publications::ID, publications_factory)
        .with(JusticeData::ID, justice_data_factory)
        .with(EnrichContainers::ID, enrich_factory)
}

fn dbt_factory(context: &SourceContext) -> Result<Box<dyn Source>, SourceError> {
    Ok(Box::new(DbtDatabases::from_context(context)?))
}

fn publications_factory(context: &SourceContext) -> Result<Box<dyn Source>, SourceError> {
    Ok(Box::new(Publications::from_context(context)?))
}

fn justice_data_factory(context: &SourceContext) -> Result<Box<dyn Source>, SourceError> {
    Ok(Box::new(JusticeData::from_context(context)?))
}

fn enrich_factory(context: &SourceContext) -> Result<Box<dyn Source>, SourceError> {
    Ok(Box::new(EnrichContainers::from_context(context)?))
}

/// Resolve `link` against `base` with standard URL reference resolution,
/// so `government/x` against `https://www.gov.uk/api` lands at the site
/// root, not under `/api`.
pub(crate) fn join_url(base: &str, link: &str) -> Option<String> {
    match Url::parse(base).and_then(|base| base.join(link)) {
        Ok(url) => Some(url.to_string()),
        Err(err) => {
            warn!(base, link, error = %err, "cannot resolve link");
            None
        }
    }
}

/// Milliseconds since the epoch for an RFC 3339 timestamp.
pub(crate) fn rfc3339_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Milliseconds since the epoch for midnight UTC of a `25 January 2024`
/// style date.
pub(crate) fn long_date_millis(raw: &str) -> Option<i64> {
    NaiveDate::parse_from_str(raw.trim(), "%d %B %Y")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_relative_and_rooted_links() {
        assert_eq!(
            join_url("https://www.gov.uk/api", "/government/statistics/x").as_deref(),
            Some("https://www.gov.uk/government/statistics/x")
        );
        assert_eq!(
            join_url("https://www.gov.uk/api/", "content/x").as_deref(),
            Some("https://www.gov.uk/api/content/x")
        );
        assert_eq!(join_url("https://a.org", "/x").as_deref(), Some("https://a.org/x"));
        assert_eq!(
            join_url("https://a.org", "https://b.org/y").as_deref(),
            Some("https://b.org/y")
        );
    }

    #[test]
    fn relative_link_replaces_last_base_segment() {
        assert_eq!(
            join_url("https://www.gov.uk/api", "government/x").as_deref(),
            Some("https://www.gov.uk/government/x")
        );
        assert_eq!(join_url("not a url", "/x"), None);
    }

    #[test]
    fn timestamps_parse_to_millis() {
        assert_eq!(rfc3339_millis("1970-01-01T00:00:01+00:00"), Some(1000));
        assert_eq!(rfc3339_millis("yesterday"), None);
        assert_eq!(long_date_millis("02 January 1970"), Some(86_400_000));
        assert_eq!(long_date_millis("2 January 1970"), Some(86_400_000));
        assert_eq!(long_date_millis(""), None);
    }

    #[test]
    fn default_registry_knows_every_pipeline() {
        let registry = default_registry();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["dbt", "enrich_containers", "justice_data", "publications"]);
    }
}
