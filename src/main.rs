//! feed-collector binary entrypoint.
//! Runs the ingest pipeline once over the configured feeds and publishes the
//! JSON snapshot. Scheduling is left to cron/systemd timers.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_collector::{config, http_providers, run_guarded, CollectorConfig};

#[derive(Parser, Debug)]
#[command(name = "feed-collector", about = "Collect topic feeds into a ranked JSON snapshot")]
struct Args {
    /// Path to collector config (TOML or JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the snapshot output path
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the snapshot to stdout instead of writing it
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

/// Explicit path, then env/default locations; any failure falls back to the built-in seed.
fn load_config(explicit: Option<&PathBuf>) -> CollectorConfig {
    let loaded = match explicit {
        Some(p) => config::load_from(p),
        None => config::load_default(),
    };
    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(target: "collector", error = ?e, "config load failed; using built-in defaults");
            CollectorConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    let cfg = load_config(args.config.as_ref());
    let output = args.output.clone().unwrap_or_else(|| cfg.output_path.clone());
    info!(
        target: "collector",
        feeds = cfg.feeds.len(),
        max_items = cfg.max_items,
        output = %output.display(),
        "collector starting"
    );

    let now = Utc::now();
    let providers = match http_providers(&cfg) {
        Ok(p) => p,
        Err(e) => {
            error!(target: "collector", error = ?e, "could not build feed providers");
            Vec::new()
        }
    };
    let snapshot = run_guarded(providers, cfg, now).await;

    if args.dry_run {
        println!("{}", snapshot.to_json_pretty()?);
        return Ok(());
    }

    snapshot.write_atomic(&output)?;
    info!(
        target: "collector",
        count = snapshot.count,
        output = %output.display(),
        "snapshot published"
    );
    Ok(())
}
