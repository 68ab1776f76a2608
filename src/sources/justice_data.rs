//! Justice Data charts
//!
//! The API serves a tree of pages whose leaves are charts. Domains flow
//! down the tree: a node's own mapping entry wins, then whatever its parent
//! resolved to, then `General`. Every chart also joins one dashboard.

use super::long_date_millis;
use crate::adapter::{Collected, Source, SourceContext, SourceError};
use crate::config::JusticeDataConfig;
use crate::fetch::JsonApi;
use crate::mapping::{
    DomainAssignment, DomainNameFormatter, DomainResolver, LabelKind, ResolutionInput, ResolutionPolicy,
};
use crate::model::{Contribution, EntityKey, Platform};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_DOMAIN: &str = "General";
pub const DASHBOARD_ID: &str = "Justice Data";
const DASHBOARD_DESCRIPTION: &str =
    "A published collection of data visualisations relating to multiple domains";

/// One entry of the `/publications` listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicationDetails {
    id: String,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    current_publish_date: Option<String>,
    #[serde(default)]
    owner_email: Option<String>,
}

/// A chart tree node waiting to be visited.
struct Pending {
    node: Value,
    inherited: Option<DomainAssignment>,
    breadcrumb: Vec<String>,
}

/// A leaf chart with everything resolved.
#[derive(Debug, Clone)]
struct Chart {
    id: String,
    name: String,
    description: Option<String>,
    permalink: String,
    breadcrumb: Vec<String>,
    domains: DomainAssignment,
    owner_email: Option<String>,
    refresh_frequency: Option<String>,
    last_updated: Option<i64>,
}

pub struct JusticeData {
    config: JusticeDataConfig,
    api: Arc<dyn JsonApi>,
    resolver: DomainResolver,
}

fn text(node: &Value, field: &str) -> Option<String> {
    node.get(field).and_then(Value::as_str).map(str::to_string)
}

impl JusticeData {
    pub const ID: &'static str = "justice_data";

    pub fn new(config: JusticeDataConfig, api: Arc<dyn JsonApi>) -> Self {
        Self::with_formatter(config, api, DomainNameFormatter::default())
    }

    pub fn with_formatter(
        config: JusticeDataConfig,
        api: Arc<dyn JsonApi>,
        formatter: DomainNameFormatter,
    ) -> Self {
        let resolver = DomainResolver::new(ResolutionPolicy::first_match().with_default(DEFAULT_DOMAIN))
            .with_mapping(config.domains.clone())
            .with_formatter(formatter);
        Self {
            config,
            api,
            resolver,
        }
    }

    pub fn from_context(context: &SourceContext) -> Result<Self, SourceError> {
        let config = context
            .config
            .justice_data
            .clone()
            .ok_or_else(|| SourceError::MissingConfig(Self::ID.to_string()))?;
        Ok(Self::with_formatter(config, context.api.clone(), context.config.formatter()))
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn list_publication_details(&self) -> Result<BTreeMap<String, PublicationDetails>, SourceError> {
        let url = format!("{}/publications", self.base_url());
        let value = self.api.get_json(&url, &[]).await?;
        let details: Vec<PublicationDetails> =
            serde_json::from_value(value).map_err(|e| SourceError::document(&url, e))?;
        Ok(details.into_iter().map(|d| (d.id.clone(), d)).collect())
    }

    /// Depth-first walk of the chart tree, returning leaves keyed by their
    /// API URL.
    async fn list_charts(
        &self,
        publications: &BTreeMap<String, PublicationDetails>,
    ) -> Result<Vec<Chart>, SourceError> {
        let root = self.api.get_json(self.base_url(), &[]).await?;
        let children = match root.get("children") {
            Some(Value::Array(children)) => children.clone(),
            _ => return Err(SourceError::document(self.base_url(), "root has no `children` array")),
        };
        info!(excluded = ?self.config.exclude_ids, "walking chart tree");

        let mut stack: Vec<Pending> = children
            .into_iter()
            .map(|node| Pending {
                node,
                inherited: None,
                breadcrumb: Vec::new(),
            })
            .collect();
        let mut leaves: BTreeMap<String, Chart> = BTreeMap::new();

        while let Some(Pending {
            node,
            inherited,
            breadcrumb,
        }) = stack.pop()
        {
            let Some(id) = text(&node, "id") else {
                warn!("chart tree node without id skipped");
                continue;
            };
            if self.config.exclude_ids.contains(&id) {
                continue;
            }
            let Some(permalink) = text(&node, "permalink") else {
                info!(id = %id, "node has no permalink and will be skipped");
                continue;
            };

            let embedded = text(&node, "domain");
            let mut input = ResolutionInput::by_id(&id);
            if let Some(parent) = &inherited {
                input = input.with_inherited(parent);
            }
            if let Some(domain) = embedded.as_deref() {
                input = input.with_embedded(domain);
            }
            let domains = self.resolver.resolve(&input);

            let name = text(&node, "name").unwrap_or_else(|| id.clone());
            let mut path = breadcrumb.clone();
            path.push(name.clone());

            let children: Vec<Value> = match node.get("children") {
                Some(Value::Array(children)) => children.iter().filter(|c| !c.is_null()).cloned().collect(),
                _ => Vec::new(),
            };

            if !children.is_empty() {
                for child in children {
                    stack.push(Pending {
                        node: child,
                        inherited: Some(domains.clone()),
                        breadcrumb: path.clone(),
                    });
                }
                continue;
            }

            let Some(api_url) = text(&node, "apiUrl") else {
                warn!(id = %id, "leaf chart has no apiUrl, skipped");
                continue;
            };

            let publication = text(&node, "dataPublicationId").and_then(|p| publications.get(&p));
            let last_updated = publication.and_then(|p| {
                let parsed = p.current_publish_date.as_deref().and_then(long_date_millis);
                if parsed.is_none() {
                    warn!(id = %p.id, "publication missing valid currentPublishDate");
                }
                parsed
            });
            let owner_email = publication
                .and_then(|p| p.owner_email.clone())
                .or_else(|| self.config.default_owner_email.clone());

            leaves.insert(
                api_url,
                Chart {
                    id,
                    name,
                    description: text(&node, "description").filter(|d| !d.is_empty()),
                    permalink,
                    breadcrumb,
                    domains,
                    owner_email,
                    refresh_frequency: publication.and_then(|p| p.frequency.clone()),
                    last_updated,
                },
            );
        }

        Ok(leaves.into_values().collect())
    }

    fn chart_contribution(&self, chart: &Chart) -> Contribution {
        let mut contribution = Contribution::for_key(EntityKey::Chart(chart.id.clone()))
            .with_name(&chart.name)
            .with_external_url(format!("{}{}", self.config.web_url(), chart.permalink))
            .with_domains(chart.domains.iter().cloned())
            .with_property(
                "refresh_frequency",
                chart.refresh_frequency.clone().unwrap_or_default(),
            )
            .displayable(true);
        if !chart.breadcrumb.is_empty() {
            contribution = contribution.with_qualified_name(chart.breadcrumb.join(" / "));
        }
        if let Some(description) = &chart.description {
            contribution = contribution.with_description(description);
        }
        if let Some(owner) = &chart.owner_email {
            contribution = contribution.with_owner(owner);
        }
        if let Some(millis) = chart.last_updated {
            contribution = contribution.with_last_modified(millis);
        }
        contribution
    }
}

#[async_trait]
impl Source for JusticeData {
    fn id(&self) -> &str {
        Self::ID
    }

    fn platform(&self) -> &Platform {
        &self.config.platform
    }

    async fn collect(&self) -> Result<Collected, SourceError> {
        let publications = self.list_publication_details().await?;
        let charts = self.list_charts(&publications).await?;
        info!(count = charts.len(), "collected charts");

        let mut collected = Collected::new();
        let mut dashboard = Contribution::for_key(EntityKey::Dashboard(DASHBOARD_ID.to_string()))
            .with_name(DASHBOARD_ID)
            .with_description(DASHBOARD_DESCRIPTION)
            .with_external_url(format!("{}/", self.config.web_url()))
            .displayable(true);

        for chart in &charts {
            dashboard = dashboard.with_member(EntityKey::Chart(chart.id.clone()));
            collected.push(self.chart_contribution(chart));
        }
        collected.push(dashboard);

        let mut configured: Vec<String> = self
            .resolver
            .mapping()
            .all_labels()
            .iter()
            .filter_map(|l| self.resolver.canonical(l))
            .collect();
        configured.push(DEFAULT_DOMAIN.to_string());
        collected.require_labels(LabelKind::Domain, configured);
        Ok(collected)
    }
}
