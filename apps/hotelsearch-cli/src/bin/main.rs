use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hotelsearch_core::config::{Config, Credentials, Settings};
use hotelsearch_core::dataset::{load_records, load_schema};
use hotelsearch_core::types::{Hotel, IndexSchema};
use hotelsearch_core::{Error, SearchService};
use hotelsearch_local::LocalSearchService;
use hotelsearch_quickstart::Quickstart;
use hotelsearch_rest::RestSearchService;

/// Create a hotels index, load it, and run a few example queries.
#[derive(Parser, Debug)]
#[command(name = "hotelsearch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run against the in-process service; no credentials needed.
    #[arg(long)]
    local: bool,

    /// Index name, overriding the schema document and config.
    #[arg(long, env = "HOTELSEARCH_INDEX_NAME")]
    index_name: Option<String>,

    /// Index schema document.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Hotel records.
    #[arg(long)]
    records: Option<PathBuf>,

    /// Enable debug logging when RUST_LOG is unset.
    #[arg(short, long)]
    verbose: bool,
}

/// Which service a run talks to.
#[derive(Debug)]
enum Backend {
    Local,
    Remote(Credentials),
    /// No credentials in the environment; the message names the missing variable.
    Unconfigured(String),
}

fn choose_backend(local: bool, config: &Config) -> hotelsearch_core::Result<Backend> {
    if local { return Ok(Backend::Local); }
    match config.credentials() {
        Ok(credentials) => Ok(Backend::Remote(credentials)),
        Err(Error::ConfigurationMissing(message)) => Ok(Backend::Unconfigured(message)),
        Err(e) => Err(e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let config = Config::load().context("Error loading config")?;
    let settings = config.settings()?;

    let backend = match choose_backend(args.local, &config)? {
        Backend::Unconfigured(message) => {
            tracing::error!(%message, "search service is not configured; set SEARCH_API_ENDPOINT and SEARCH_API_KEY or pass --local");
            return Ok(());
        }
        backend => backend,
    };

    let schema_path = args.schema.unwrap_or_else(|| config.resolve_path(&settings.data.schema_file));
    let records_path = args.records.unwrap_or_else(|| config.resolve_path(&settings.data.records_file));
    let mut schema = load_schema(&schema_path).with_context(|| format!("reading index schema {}", schema_path.display()))?;
    if let Some(name) = args.index_name.or_else(|| settings.search.index_name.clone()) { schema = schema.with_name(name); }
    let records = load_records(&records_path).with_context(|| format!("reading records {}", records_path.display()))?;

    println!("Hotel Search Quickstart\n=======================");
    println!("Index: {}", schema.name);
    println!("Records: {} ({})", records.len(), records_path.display());

    match backend {
        Backend::Remote(credentials) => {
            println!("Service: {}", credentials.endpoint);
            let service = RestSearchService::new(&credentials, &settings.search)?;
            run(service, &settings, &schema, &records).await
        }
        _ => {
            println!("Service: in-process");
            run(LocalSearchService::new(), &settings, &schema, &records).await
        }
    }
}

async fn run<S: SearchService>(service: S, settings: &Settings, schema: &IndexSchema, records: &[Hotel]) -> Result<()> {
    let quickstart = Quickstart::new(service, settings);
    let summary = quickstart.run(schema, records, &mut std::io::stdout()).await?;

    println!("\n✅ Quickstart completed!");
    println!("📊 Uploaded {} of {} records", summary.upload.succeeded_count(), records.len());
    if summary.document_count != summary.expected_count {
        println!("⚠️  Index reported {} documents, expected {}", summary.document_count, summary.expected_count);
    }
    Ok(())
}
