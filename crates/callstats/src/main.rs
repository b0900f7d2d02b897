use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use callstats_bucket::{BucketStore, LocalDirStore, S3BucketStore, S3Config};
use callstats_core::loader::load_calls_from_path;
use callstats_core::publish::{render_artifacts, upload_artifacts, write_local_copies};
use callstats_core::{run_pipeline, PipelineConfig, RunSummary};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOCAL_BUCKET_FALLBACK: &str = "callstats";

#[derive(Parser, Debug)]
#[command(author, version, about = "Call activity reports per sales manager", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the three report tables from a call-log extract and publish them
    Run(RunArgs),
    /// Print the effective pipeline settings as TOML
    ShowConfig(ConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Raw call-log CSV
    #[arg(long, default_value = "calls_raw_full.csv")]
    input: PathBuf,

    /// Directory that receives local copies of the report CSVs
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Write the reports locally only
    #[arg(long, conflicts_with = "local_store")]
    skip_upload: bool,

    /// Publish into this directory instead of object storage
    #[arg(long)]
    local_store: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML file overriding thresholds, time buckets or direction labels
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<PipelineConfig> {
        match &self.config {
            Some(path) => PipelineConfig::from_path(path)
                .with_context(|| format!("failed to load pipeline config {}", path.display())),
            None => Ok(PipelineConfig::default()),
        }
    }
}

/// Object storage settings, read from the environment once per process.
struct StorageSettings {
    bucket: Option<String>,
    s3: S3Config,
}

impl StorageSettings {
    fn from_env() -> Self {
        Self {
            bucket: std::env::var("YC_BUCKET_NAME")
                .ok()
                .filter(|value| !value.is_empty()),
            s3: S3Config::from_env(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(args) => {
            dotenvy::dotenv().ok();
            let storage = StorageSettings::from_env();
            run(args, storage).await
        }
        Command::ShowConfig(args) => {
            let config = args.load()?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt().with_env_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: RunArgs, storage: StorageSettings) -> Result<()> {
    let config = args.config.load()?;

    info!(input = %args.input.display(), "processing call log");
    let batch = load_calls_from_path(&args.input)
        .with_context(|| format!("failed to read call log {}", args.input.display()))?;
    let loaded = batch.len();

    let output = run_pipeline(batch, &config).context("call metric pipeline failed")?;
    let artifacts = render_artifacts(&output.tables).context("failed to serialize reports")?;

    let written = write_local_copies(&args.output_dir, &artifacts).with_context(|| {
        format!("failed to write reports to {}", args.output_dir.display())
    })?;
    for path in &written {
        info!(path = %path.display(), "wrote report");
    }

    if args.skip_upload {
        warn!("Skipping upload to object storage");
    } else {
        let (store, bucket) = connect_store(args.local_store.as_deref(), &storage).await?;
        info!(bucket = %bucket, "uploading reports");
        upload_artifacts(store.as_ref(), &bucket, &artifacts)
            .await
            .context("failed to upload reports")?;
    }

    print_summary(loaded, &output.summary, &output.tables.row_counts());
    Ok(())
}

async fn connect_store(
    local_store: Option<&Path>,
    storage: &StorageSettings,
) -> Result<(Box<dyn BucketStore>, String)> {
    if let Some(root) = local_store {
        let bucket = storage
            .bucket
            .clone()
            .unwrap_or_else(|| LOCAL_BUCKET_FALLBACK.to_string());
        return Ok((Box::new(LocalDirStore::new(root)), bucket));
    }

    let bucket = storage
        .bucket
        .clone()
        .context("YC_BUCKET_NAME must be set to upload reports")?;
    if !storage.s3.has_static_credentials() {
        warn!("YC_ACCESS_KEY / YC_SECRET_KEY not set; falling back to the default credential chain");
    }
    let store = S3BucketStore::new(storage.s3.clone())
        .await
        .context("failed to configure object storage client")?;
    Ok((Box::new(store), bucket))
}

fn print_summary(loaded: usize, summary: &RunSummary, tables: &[(&'static str, usize)]) {
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Rows"]);
    table.add_row(vec!["loaded".to_string(), loaded.to_string()]);
    table.add_row(vec!["kept".to_string(), summary.filter.kept_rows.to_string()]);
    table.add_row(vec![
        "dropped: short or no duration".to_string(),
        summary.filter.short_or_missing_duration.to_string(),
    ]);
    table.add_row(vec![
        "dropped: missing timestamp".to_string(),
        summary.filter.missing_timestamp.to_string(),
    ]);
    table.add_row(vec![
        "dropped: invalid timestamp".to_string(),
        summary.filter.invalid_timestamp.to_string(),
    ]);
    table.add_row(vec![
        "outside time buckets".to_string(),
        summary.outside_time_buckets.to_string(),
    ]);
    for (name, rows) in tables {
        table.add_row(vec![name.to_string(), rows.to_string()]);
    }
    println!("{table}");
}
