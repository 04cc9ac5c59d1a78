use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use oncohotspot::app::ports::{OutcomeSinkPort, RecordSourcePort, RunSummaryPort};
use oncohotspot::app::AggregationUseCase;
use oncohotspot::config::AggregatorConfig;
use oncohotspot::infra::{
    FileOutcomeOutputAdapter, FileReviewQueueAdapter, FileRunSummaryAdapter, FileStorageRowAdapter,
    NdjsonRecordSource,
};
use oncohotspot::observability::{self, metrics};
use oncohotspot::pipeline::processing::canonicalize::CancerTaxonomy;
use oncohotspot::pipeline::AggregationPipeline;

#[derive(Parser)]
#[command(name = "oncohotspot")]
#[command(about = "Cancer mutation-frequency aggregation engine")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one aggregation batch over an NDJSON file of raw source records
    Run {
        /// Input file, one {"source_id", "record_path", "record"} document per line
        #[arg(long)]
        input: PathBuf,
        /// Configuration file (defaults to $ONCOHOTSPOT_CONFIG or ./oncohotspot.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output directory, overriding [output].directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Build the cancer-type taxonomy and report on it
    CheckTaxonomy {
        /// Taxonomy table (defaults to the configured or built-in table)
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
    /// Canonicalize a single cancer-type label
    Label {
        text: String,
        #[arg(long)]
        taxonomy: Option<PathBuf>,
    },
}

fn taxonomy_path(explicit: Option<PathBuf>) -> anyhow::Result<Option<PathBuf>> {
    match explicit {
        Some(path) => Ok(Some(path)),
        None => Ok(AggregatorConfig::load(None)?.taxonomy_path),
    }
}

async fn run(input: PathBuf, config_path: Option<PathBuf>, output_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AggregatorConfig::load(config_path.as_deref())?;
    let output_dir = output_dir.unwrap_or_else(|| config.output.directory.clone());

    let _log_guard = observability::init_logging(&output_dir.join("logs"));
    if let Err(e) = metrics::init() {
        warn!("Metrics recorder not installed: {}", e);
    }

    info!(
        input = %input.display(),
        output_dir = %output_dir.display(),
        workers = config.pipeline.worker_pool_size,
        "oncohotspot run starting"
    );

    let pipeline = AggregationPipeline::from_config(&config)?;
    let records = NdjsonRecordSource::new(&input).read_records().await?;

    let outcome_sinks: Vec<Box<dyn OutcomeSinkPort>> = vec![
        Box::new(FileOutcomeOutputAdapter::new(&output_dir.join("outcomes.ndjson"))?),
        Box::new(FileStorageRowAdapter::new(&output_dir.join("storage_rows.ndjson"))?),
    ];
    let review_queue = Box::new(FileReviewQueueAdapter::new(&output_dir.join("review_queue.ndjson"))?);
    let use_case = AggregationUseCase::new(pipeline, outcome_sinks, review_queue);

    let report = match use_case.execute(records).await {
        Ok(report) => report,
        Err(e) => {
            error!("Aggregation run failed: {}", e);
            println!("❌ Aggregation run failed: {}", e);
            return Err(e);
        }
    };

    FileRunSummaryAdapter::new(&output_dir.join("run_summary.json"))
        .write_summary(&report)
        .await?;
    if let Some(rendered) = metrics::render() {
        tokio::fs::write(output_dir.join("metrics.prom"), rendered).await?;
    }

    let tally = &report.tally;
    println!("\n📊 Aggregation results (run {}):", report.run_id);
    println!("   Input records: {}", tally.input_records);
    println!("   Merged records: {}", tally.outcomes);
    println!("   Accepted: {}", tally.accepted);
    println!("   Flagged: {}", tally.flagged);
    println!("   Excluded: {}", tally.excluded);
    for (reason, count) in &tally.excluded_by_reason {
        println!("     - {}: {}", reason, count);
    }
    for (status, count) in &tally.merge_status {
        println!("   {}: {}", status, count);
    }
    println!("   Outcome digest: {}", report.outcome_digest);
    println!("   Output directory: {}", output_dir.display());
    Ok(())
}

fn check_taxonomy(taxonomy: Option<PathBuf>) -> anyhow::Result<()> {
    let path = taxonomy_path(taxonomy)?;
    match CancerTaxonomy::load_or_builtin(path.as_deref()) {
        Ok(taxonomy) => {
            println!(
                "✅ Taxonomy {} ({}): {} labels, {} synonym keys",
                taxonomy.version(),
                describe(path.as_deref()),
                taxonomy.label_count(),
                taxonomy.synonym_count()
            );
            Ok(())
        }
        Err(e) => {
            println!("❌ Taxonomy {} failed to build: {}", describe(path.as_deref()), e);
            Err(e.into())
        }
    }
}

fn label(text: &str, taxonomy: Option<PathBuf>) -> anyhow::Result<()> {
    let path = taxonomy_path(taxonomy)?;
    let taxonomy = CancerTaxonomy::load_or_builtin(path.as_deref())?;
    match taxonomy.lookup(text) {
        Some((canonical, kind)) => {
            println!(
                "{} -> {} ({} match, taxonomy {})",
                text,
                canonical,
                kind.as_str(),
                taxonomy.version()
            );
            Ok(())
        }
        None => anyhow::bail!("'{}' has no mapping in taxonomy {}", text, taxonomy.version()),
    }
}

fn describe(path: Option<&Path>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => "built-in".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            output_dir,
        } => run(input, config, output_dir).await,
        Commands::CheckTaxonomy { taxonomy } => check_taxonomy(taxonomy),
        Commands::Label { text, taxonomy } => label(&text, taxonomy),
    }
}
