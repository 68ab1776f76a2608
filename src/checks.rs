//! Post-ingestion checks
//!
//! `relations_check` finds displayed tables whose dataset has no `IsPartOf`
//! relation, which leaves their database container looking empty.
//! `compare_environment_counts` diffs per-platform facet counts between two
//! environments.

use crate::adapter::{CatalogueSink, SinkError, IS_PART_OF};
use crate::mapping::NameParser;
use crate::model::{Manifest, Platform};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Ratio deviation beyond which two counts are reported.
pub const DEFAULT_MISMATCH_THRESHOLD: f64 = 0.2;

/// Dataset URNs of display-tagged tables that are not part of any
/// container, in URN order.
pub async fn relations_check(
    manifest: &Manifest,
    parser: &NameParser,
    platform: &Platform,
    display_marker: &str,
    sink: &dyn CatalogueSink,
) -> Result<Vec<String>, SinkError> {
    let datasets: BTreeSet<String> = manifest
        .nodes()
        .filter(|node| node.resource_kind.is_resolvable() && node.has_tag(display_marker))
        .filter_map(|node| parser.parse_or_skip(node))
        .map(|identity| platform.dataset_urn(&identity.qualified_name()))
        .collect();
    info!(count = datasets.len(), "checking containment of displayed datasets");

    let mut missing = Vec::new();
    for dataset in datasets {
        let related = sink.get_related_entities(&dataset, IS_PART_OF).await?;
        if related.is_empty() {
            debug!(dataset = %dataset, "no IsPartOf relation");
            missing.push(dataset);
        }
    }
    Ok(missing)
}

/// One aggregation bucket of a facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
}

/// facet name -> buckets
pub type FacetCounts = BTreeMap<String, Vec<FacetValue>>;

/// platform -> facet counts, as produced by a counts query per environment.
pub type PlatformCounts = BTreeMap<String, FacetCounts>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingValues {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_in_preprod: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_in_prod: Vec<String>,
}

/// Differences between two environments. Platforms and facets with nothing
/// to report are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentComparison {
    pub missing_values: BTreeMap<String, BTreeMap<String, MissingValues>>,
    /// platform -> facet -> value -> preprod/prod ratio
    pub mismatched_counts: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>,
}

impl EnvironmentComparison {
    pub fn is_clean(&self) -> bool {
        self.missing_values.is_empty() && self.mismatched_counts.is_empty()
    }
}

fn counts(buckets: &[FacetValue]) -> BTreeMap<&str, u64> {
    buckets.iter().map(|b| (b.value.as_str(), b.count)).collect()
}

/// Compare every facet prod reports for `platforms` against preprod.
///
/// A value present on only one side is reported as missing. A value
/// counted on both sides (both non-zero) is reported when
/// `|1 - preprod/prod|` exceeds `threshold`.
pub fn compare_environment_counts(
    platforms: &[String],
    prod: &PlatformCounts,
    preprod: &PlatformCounts,
    threshold: f64,
) -> EnvironmentComparison {
    let mut comparison = EnvironmentComparison::default();
    let empty = FacetCounts::new();

    for platform in platforms {
        let prod_facets = prod.get(platform).unwrap_or(&empty);
        let preprod_facets = preprod.get(platform).unwrap_or(&empty);

        for (facet, prod_buckets) in prod_facets {
            let prod_counts = counts(prod_buckets);
            let preprod_counts = preprod_facets
                .get(facet)
                .map(|b| counts(b))
                .unwrap_or_default();

            let missing = MissingValues {
                missing_in_preprod: prod_counts
                    .keys()
                    .filter(|v| !preprod_counts.contains_key(*v))
                    .map(|v| v.to_string())
                    .collect(),
                missing_in_prod: preprod_counts
                    .keys()
                    .filter(|v| !prod_counts.contains_key(*v))
                    .map(|v| v.to_string())
                    .collect(),
            };
            if missing != MissingValues::default() {
                comparison
                    .missing_values
                    .entry(platform.clone())
                    .or_default()
                    .insert(facet.clone(), missing);
            }

            let mismatched: BTreeMap<String, f64> = prod_counts
                .iter()
                .filter_map(|(value, &count)| {
                    let preprod_count = preprod_counts.get(value).copied().unwrap_or(0);
                    if count == 0 || preprod_count == 0 {
                        return None;
                    }
                    let ratio = preprod_count as f64 / count as f64;
                    ((1.0 - ratio).abs() > threshold).then(|| (value.to_string(), ratio))
                })
                .collect();
            if !mismatched.is_empty() {
                comparison
                    .mismatched_counts
                    .entry(platform.clone())
                    .or_default()
                    .insert(facet.clone(), mismatched);
            }
        }
    }

    comparison
}
