//! catalogue-ingest CLI: run ingestion pipelines and post-ingestion checks.
//!
//! Usage:
//!   catalogue-ingest run <pipeline> --config <yaml> --labels <yaml> [--output path] [--existing jsonl]
//!   catalogue-ingest check relations --manifest <path> --catalogue <jsonl> [--config yaml]
//!   catalogue-ingest check compare --platforms dbt glue --prod-results <json> --preprod-results <json>

use catalogue_ingest::adapter::{CatalogueSink, InMemoryCatalogue, JsonLinesSink, SourceContext};
use catalogue_ingest::checks::{self, PlatformCounts, DEFAULT_MISMATCH_THRESHOLD};
use catalogue_ingest::config::{DbtConfig, IngestConfig};
use catalogue_ingest::fetch::{DocumentFetcher, DocumentRouter, HttpClient, JsonApi, LabelSnapshot, LocalFetcher};
use catalogue_ingest::mapping::{NameParser, DISPLAY_MARKER};
use catalogue_ingest::model::{Manifest, Platform};
use catalogue_ingest::pipeline::IngestPipeline;
use catalogue_ingest::sources::default_registry;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

/// Request timeout for upstream APIs.
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Parser)]
#[command(
    name = "catalogue-ingest",
    version,
    about = "Ingest metadata into the data catalogue"
)]
struct Cli {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pipeline
    Run {
        /// Pipeline name: dbt, publications, justice_data or enrich_containers
        pipeline: String,
        /// Path to the YAML config
        #[arg(long)]
        config: PathBuf,
        /// YAML snapshot of the domains and tags that exist in the catalogue
        #[arg(long)]
        labels: PathBuf,
        /// Write proposals as JSON Lines to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Proposal log of earlier runs, read as the current catalogue state
        /// by pipelines that extend existing entities
        #[arg(long)]
        existing: Option<PathBuf>,
        /// Override the dbt manifest location
        #[arg(long)]
        manifest: Option<String>,
        /// Override the database metadata location
        #[arg(long)]
        database_metadata: Option<String>,
        /// Override the platform instance
        #[arg(long)]
        instance: Option<String>,
    },
    /// Post-ingestion checks
    Check {
        #[command(subcommand)]
        check: CheckCommand,
    },
}

#[derive(Subcommand)]
enum CheckCommand {
    /// List displayed datasets that are not part of their database container
    Relations {
        /// Path to the dbt manifest
        #[arg(long)]
        manifest: PathBuf,
        /// Proposal log written by `run --output`
        #[arg(long)]
        catalogue: PathBuf,
        /// Config supplying platform, split convention and display marker
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Compare per-platform facet counts between prod and preprod
    Compare {
        #[arg(long, num_args = 1.., required = true)]
        platforms: Vec<String>,
        /// Prod counts: inline JSON or a path to a JSON file
        #[arg(long)]
        prod_results: String,
        /// Preprod counts: inline JSON or a path to a JSON file
        #[arg(long)]
        preprod_results: String,
        #[arg(long, default_value_t = DEFAULT_MISMATCH_THRESHOLD)]
        threshold: f64,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("failed to create tokio runtime: {}", e))
}

fn load_config(path: &Path) -> Result<IngestConfig, String> {
    IngestConfig::load(path).map_err(|e| e.to_string())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    pipeline: &str,
    config: &Path,
    labels: &Path,
    output: Option<&Path>,
    existing: Option<&Path>,
    manifest: Option<String>,
    database_metadata: Option<String>,
    instance: Option<String>,
) -> i32 {
    let mut config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(manifest) = manifest {
        match config.dbt.as_mut() {
            Some(dbt) => dbt.manifest = manifest,
            None => {
                config.dbt = Some(DbtConfig {
                    manifest,
                    database_metadata: None,
                    split_convention: Default::default(),
                })
            }
        }
    }
    if let Some(uri) = database_metadata {
        if let Some(dbt) = config.dbt.as_mut() {
            dbt.database_metadata = Some(uri);
        }
    }
    if let Some(instance) = instance {
        config.platform.instance = Some(instance);
    }

    let registry = default_registry();
    if !registry.contains(pipeline) {
        let known: Vec<&str> = registry.names().collect();
        eprintln!("Error: unknown pipeline '{}' (known: {})", pipeline, known.join(", "));
        return 1;
    }

    let labels = match LabelSnapshot::load(labels) {
        Ok(l) => Arc::new(l),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let http = match HttpClient::new(HTTP_TIMEOUT_SECS) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let current = match existing.map(InMemoryCatalogue::load_jsonl).transpose() {
        Ok(current) => current.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: cannot replay existing proposals: {}", e);
            return 1;
        }
    };
    let sink = match output {
        Some(path) => match JsonLinesSink::create(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: cannot open '{}': {}", path.display(), e);
                return 1;
            }
        },
        None => JsonLinesSink::stdout(),
    };
    let sink: Arc<dyn CatalogueSink> = Arc::new(sink.with_mirror(current));

    let documents: Arc<dyn DocumentFetcher> =
        Arc::new(DocumentRouter::new(LocalFetcher::new(config.documents_root())).with_http(http.clone()));
    let api: Arc<dyn JsonApi> = Arc::new(http);
    let config = Arc::new(config);
    let context = SourceContext::new(config.clone(), documents, api);

    let source = match registry.create(pipeline, &context) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let merger = config.merger(source.platform());
    let pipeline = IngestPipeline::new(source, labels, sink).with_merger(merger);

    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match rt.block_on(pipeline.run()) {
        Ok(summary) if summary.emitted.is_fully_committed() => 0,
        Ok(summary) => {
            for rejection in &summary.emitted.rejections {
                eprintln!(
                    "Error: {} {} rejected: {}",
                    rejection.target, rejection.kind, rejection.reason
                );
            }
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_check_relations(manifest: &Path, catalogue: &Path, config: Option<&Path>) -> i32 {
    let (platform, parser, marker) = match config {
        Some(path) => match load_config(path) {
            Ok(c) => {
                let convention = c.dbt.as_ref().map(|d| d.split_convention).unwrap_or_default();
                (c.platform, NameParser::new(convention), c.display.marker)
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => (Platform::default(), NameParser::default(), DISPLAY_MARKER.to_string()),
    };

    let manifest = match std::fs::read_to_string(manifest)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Manifest>(&text).map_err(|e| e.to_string()))
    {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot read manifest '{}': {}", manifest.display(), e);
            return 1;
        }
    };
    let catalogue = match InMemoryCatalogue::load_jsonl(catalogue) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: cannot load catalogue '{}': {}", catalogue.display(), e);
            return 1;
        }
    };

    let rt = match runtime() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let result = rt.block_on(checks::relations_check(&manifest, &parser, &platform, &marker, &catalogue));
    match result.and_then(|missing| Ok(serde_json::to_string(&missing)?)) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Inline JSON, or a path to a file holding it.
fn read_counts(arg: &str) -> Result<PlatformCounts, String> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).map_err(|e| format!("cannot read '{}': {}", arg, e))?
    };
    serde_json::from_str(&text).map_err(|e| format!("invalid counts JSON: {}", e))
}

fn cmd_check_compare(platforms: &[String], prod: &str, preprod: &str, threshold: f64) -> i32 {
    let (prod, preprod) = match (read_counts(prod), read_counts(preprod)) {
        (Ok(prod), Ok(preprod)) => (prod, preprod),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let comparison = checks::compare_environment_counts(platforms, &prod, &preprod, threshold);
    match serde_json::to_string(&comparison) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let code = match cli.command {
        Commands::Run {
            pipeline,
            config,
            labels,
            output,
            existing,
            manifest,
            database_metadata,
            instance,
        } => cmd_run(
            &pipeline,
            &config,
            &labels,
            output.as_deref(),
            existing.as_deref(),
            manifest,
            database_metadata,
            instance,
        ),
        Commands::Check { check } => match check {
            CheckCommand::Relations {
                manifest,
                catalogue,
                config,
            } => cmd_check_relations(&manifest, &catalogue, config.as_deref()),
            CheckCommand::Compare {
                platforms,
                prod_results,
                preprod_results,
                threshold,
            } => cmd_check_compare(&platforms, &prod_results, &preprod_results, threshold),
        },
    };
    std::process::exit(code);
}
