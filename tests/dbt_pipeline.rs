//! dbt manifest pipeline, end to end against the in-memory catalogue.

mod common;

use catalogue_ingest::adapter::InMemoryCatalogue;
use catalogue_ingest::checks::relations_check;
use catalogue_ingest::config::IngestConfig;
use catalogue_ingest::mapping::NameParser;
use catalogue_ingest::model::{Aspect, AspectKind, Manifest, Platform};
use catalogue_ingest::pipeline::IngestPipeline;
use catalogue_ingest::sources::default_registry;
use common::{database_metadata, dbt_manifest, domain_set, tag_set, write_json, FakeApi};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
platform:
  platform: dbt
  instance: cadet.awsdatacatalog
dbt:
  manifest: s3://bucket/manifest.json
  database_metadata: s3://bucket/database_metadata.json
"#;

fn documents() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("bucket")).unwrap();
    write_json(&dir.path().join("bucket"), "manifest.json", &dbt_manifest());
    write_json(&dir.path().join("bucket"), "database_metadata.json", &database_metadata());
    dir
}

fn pipeline(dir: &TempDir, catalogue: Arc<InMemoryCatalogue>) -> IngestPipeline {
    let config = IngestConfig::from_yaml(CONFIG).unwrap();
    let merger = config.merger(&config.platform);
    let context = common::context(config, dir.path(), Arc::new(FakeApi::new()));
    let source = default_registry().create("dbt", &context).unwrap();
    IngestPipeline::new(source, catalogue.clone(), catalogue).with_merger(merger)
}

fn platform() -> Platform {
    Platform::new("dbt").with_instance("cadet.awsdatacatalog")
}

// === Scenario: displayed model with database metadata ===

#[tokio::test]
async fn database_container_is_tagged_owned_and_in_its_domain() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    let summary = pipeline(&dir, catalogue.clone()).run().await.unwrap();
    assert!(summary.emitted.is_fully_committed());

    let container = platform().container_urn("prison_database");
    assert_eq!(
        tag_set(&catalogue, &container),
        vec!["urn:li:tag:Prison", "urn:li:tag:dc_display_in_catalogue"]
    );
    assert_eq!(domain_set(&catalogue, &container), vec!["urn:li:domain:Prison"]);
    match catalogue.latest(&container, AspectKind::Ownership) {
        Some(Aspect::Ownership { owners, ownership_type }) => {
            assert_eq!(owners, vec!["urn:li:corpuser:a.b"]);
            assert_eq!(ownership_type, "DATAOWNER");
        }
        other => panic!("expected ownership, got {other:?}"),
    }
    match catalogue.latest(&container, AspectKind::Container) {
        Some(Aspect::Container { name, description, .. }) => {
            assert_eq!(name, "prison_database");
            assert_eq!(description.as_deref(), Some("Prison data"));
        }
        other => panic!("expected container properties, got {other:?}"),
    }
    assert!(catalogue.latest("urn:li:corpuser:a.b", AspectKind::UserInfo).is_some());
}

#[tokio::test]
async fn tables_get_domain_and_containment() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, catalogue.clone()).run().await.unwrap();

    let table = "urn:li:dataset:(urn:li:dataPlatform:dbt,cadet.awsdatacatalog.prison_database.table1,PROD)";
    assert_eq!(domain_set(&catalogue, table), vec!["urn:li:domain:Prison"]);
    assert_eq!(tag_set(&catalogue, table), vec!["urn:li:tag:dc_display_in_catalogue"]);
    assert_eq!(
        catalogue.latest(table, AspectKind::Containment),
        Some(Aspect::Containment {
            container: platform().container_urn("prison_database")
        })
    );

    let hidden = platform().dataset_urn("prison_database.table2");
    assert!(tag_set(&catalogue, &hidden).is_empty());
}

// === Scenario: seed domain rule ===

#[tokio::test]
async fn seeds_borrow_the_domain_of_their_database() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, catalogue.clone()).run().await.unwrap();

    let codes = platform().dataset_urn("prison_database.codes");
    assert_eq!(domain_set(&catalogue, &codes), vec!["urn:li:domain:Prison"]);

    let postcodes = platform().dataset_urn("ref_database.postcodes");
    assert!(domain_set(&catalogue, &postcodes).is_empty());
    assert!(catalogue.latest(&postcodes, AspectKind::Containment).is_some());
}

// === Scenario: malformed nodes are skipped ===

#[tokio::test]
async fn malformed_model_produces_no_entities() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, catalogue.clone()).run().await.unwrap();

    let courts = platform().container_urn("courts_database");
    assert!(!catalogue.entities().contains(&courts));
}

// === Scenario: idempotence ===

#[tokio::test]
async fn rerun_produces_the_same_proposals() {
    let dir = documents();
    let first = Arc::new(InMemoryCatalogue::new());
    let second = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, first.clone()).run().await.unwrap();
    pipeline(&dir, second.clone()).run().await.unwrap();

    assert_eq!(first.proposals(), second.proposals());
}

#[tokio::test]
async fn no_target_and_aspect_pair_is_emitted_twice() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, catalogue.clone()).run().await.unwrap();

    let proposals = catalogue.proposals();
    let mut seen = std::collections::BTreeSet::new();
    for proposal in &proposals {
        assert!(seen.insert((proposal.target.clone(), proposal.kind())), "duplicate {proposal:?}");
    }
}

// === Scenario: post-ingestion relations check ===

#[tokio::test]
async fn every_displayed_table_is_part_of_a_container() {
    let dir = documents();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    pipeline(&dir, catalogue.clone()).run().await.unwrap();

    let manifest = Manifest::from_value(dbt_manifest()).unwrap();
    let missing = relations_check(
        &manifest,
        &NameParser::default(),
        &platform(),
        "dc_display_in_catalogue",
        catalogue.as_ref(),
    )
    .await
    .unwrap();
    assert!(missing.is_empty(), "missing IsPartOf: {missing:?}");
}

#[tokio::test]
async fn missing_manifest_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let catalogue = Arc::new(InMemoryCatalogue::new());
    let err = pipeline(&dir, catalogue.clone()).run().await.unwrap_err();

    assert!(err.to_string().contains("manifest.json"));
    assert!(catalogue.proposals().is_empty());
}
