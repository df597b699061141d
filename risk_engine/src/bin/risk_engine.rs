use std::{num::NonZeroU32, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_data_ingestor::providers::{
    cryptocompare::CryptoCompareProvider, rate_limited::RateLimitedProvider,
};
use risk_engine::{
    config::{RiskEngineConfig, load_config_path},
    pipeline::{MarketRequest, run},
    snapshot::{JsonFileSink, load_snapshot},
};
use shared_utils::env::optional_env_var;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file used when `--config` is not given.
const CONFIG_ENV: &str = "RISK_ENGINE_CONFIG";

#[derive(Parser)]
#[command(version, about = "Crypto risk and signal snapshot generator")]
struct Cli {
    /// TOML configuration; built-in defaults when omitted.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Analyse the market and write a fresh snapshot.
    Analyze {
        /// Comma-separated symbols to analyse instead of the configured list.
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Snapshot path; overrides `snapshot_path` from the config.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print a summary of an existing snapshot.
    Show {
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<RiskEngineConfig> {
    match path.or_else(|| optional_env_var(CONFIG_ENV).map(PathBuf::from)) {
        Some(path) => load_config_path(&path),
        None => Ok(RiskEngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.cmd {
        Cmd::Analyze {
            assets,
            lookback_days,
            output,
        } => {
            let path = output.unwrap_or_else(|| config.snapshot_path.clone());

            let previous = match load_snapshot(&path) {
                Ok(previous) => previous,
                Err(err) => {
                    warn!(error = %err, "ignoring unreadable previous snapshot");
                    None
                }
            };

            let provider = if config.provider.require_api_key {
                CryptoCompareProvider::from_env_required()
            } else {
                CryptoCompareProvider::from_env()
            }
            .context("create CryptoCompare provider")?;
            let rate = NonZeroU32::new(config.pacing.requests_per_minute)
                .context("pacing.requests_per_minute must be at least 1")?;
            let provider = RateLimitedProvider::per_minute(provider, rate);

            let request = MarketRequest {
                assets: (!assets.is_empty()).then_some(assets),
                lookback_days,
                ..MarketRequest::default()
            };
            let sink = JsonFileSink::new(&path);
            let summary = run(&provider, &config, &request, previous.as_ref(), &sink)
                .await
                .with_context(|| format!("write snapshot {}", path.display()))?;

            info!(
                path = %summary.written.display(),
                live = summary.live,
                degraded = summary.degraded,
                "snapshot written"
            );
            println!("{}", summary.snapshot);
        }
        Cmd::Show { input } => {
            let path = input.unwrap_or(config.snapshot_path);
            let snapshot = load_snapshot(&path)
                .with_context(|| format!("read snapshot {}", path.display()))?
                .with_context(|| format!("no snapshot at {}", path.display()))?;
            println!("{snapshot}");
        }
    }

    Ok(())
}
