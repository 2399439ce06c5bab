//! macrofeed CLI.
//!
//! Commands:
//! - `refresh`: fetch every configured source over HTTP and print the output JSON
//! - `offline`: run the same assembly over payload files already on disk

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use macrofeed_core::Config;
use macrofeed_ingestion::{HttpSource, MemorySource, PayloadSource};
use macrofeed_pipeline::refresh::{series_requests, FISCAL, HOLDINGS_ARCHIVE, HOLDINGS_CURRENT};
use macrofeed_pipeline::{RefreshOutput, Refresher};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "macrofeed",
    about = "Normalize public fiscal, holdings and rate data into aligned series"
)]
struct Cli {
    /// Path to a TOML config file. Missing sections use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD) for the holdings display window. Defaults to today.
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source over HTTP and print one refresh output.
    Refresh {
        /// Series API key; overrides `fetch.api_key` from the config file.
        #[arg(long, env = "MACROFEED_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Assemble an output from local payload files.
    Offline {
        /// Fiscal statement JSON.
        #[arg(long)]
        fiscal: Option<PathBuf>,

        /// Archival holdings text report.
        #[arg(long)]
        archive: Option<PathBuf>,

        /// Current holdings HTML page.
        #[arg(long)]
        current: Option<PathBuf>,

        /// Directory of series payloads named `<slot>.json` (e.g. `DGS10.json`, `DGS10@m.json`).
        #[arg(long)]
        series_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    let now = parse_now(cli.now.as_deref())?;

    let output = match cli.command {
        Commands::Refresh { api_key } => {
            if api_key.is_some() {
                config.fetch.api_key = api_key;
            }
            let source = HttpSource::new(&config.fetch)?;
            run(config, Box::new(source), now).await?
        }
        Commands::Offline {
            fiscal,
            archive,
            current,
            series_dir,
        } => {
            let source = offline_source(
                &config,
                fiscal.as_deref(),
                archive.as_deref(),
                current.as_deref(),
                series_dir.as_deref(),
            )?;
            run(config, Box::new(source), now).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(
    config: Config,
    source: Box<dyn PayloadSource>,
    now: NaiveDate,
) -> Result<RefreshOutput> {
    let refresher = Refresher::new(config, source)?;
    let output = refresher.refresh(now).await;
    info!(failures = output.failures.len(), "done");
    Ok(output)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config =
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn parse_now(now: Option<&str>) -> Result<NaiveDate> {
    match now {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--now must be YYYY-MM-DD, got `{s}`")),
        None => Ok(Utc::now().date_naive()),
    }
}

/// Serve local files under the same slot names an HTTP refresh would use.
///
/// Slots without a file are left out and show up as failures in the output.
fn offline_source(
    config: &Config,
    fiscal: Option<&Path>,
    archive: Option<&Path>,
    current: Option<&Path>,
    series_dir: Option<&Path>,
) -> Result<MemorySource> {
    let mut source = MemorySource::new();
    for (slot, path) in [
        (FISCAL, fiscal),
        (HOLDINGS_ARCHIVE, archive),
        (HOLDINGS_CURRENT, current),
    ] {
        if let Some(path) = path {
            source = source.with_payload(slot, read(path)?);
        }
    }

    if let Some(dir) = series_dir {
        for request in series_requests(config) {
            let slot = request.slot();
            let path = dir.join(format!("{slot}.json"));
            if path.is_file() {
                source = source.with_payload(&slot, read(&path)?);
            } else {
                debug!(slot = %slot, path = %path.display(), "no series file");
            }
        }
    }
    Ok(source)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
