//! mackerel-plugin-falcon
//!
//! CrowdStrike Falcon sensor statistics for mackerel-agent.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use falcon_core::{DEFAULT_FALCONCTL, DEFAULT_PREFIX, DEFAULT_TIMEOUT_SECS};
use falcon_plugin::{FalconPlugin, MackerelPlugin};
use falcon_probe::{Falconctl, FalconctlConfig, ReportFile, ReportSource};

#[derive(Parser)]
#[command(name = "mackerel-plugin-falcon")]
#[command(author, version, about = "CrowdStrike Falcon sensor metrics for mackerel-agent", long_about = None)]
struct Cli {
    /// Metric key prefix
    #[arg(long, default_value = DEFAULT_PREFIX)]
    metric_key_prefix: String,

    /// Temp file name (state for differenced metrics)
    #[arg(long)]
    tempfile: Option<PathBuf>,

    /// Path to falconctl
    #[arg(long, default_value = DEFAULT_FALCONCTL)]
    falconctl: PathBuf,

    /// Seconds to wait for falconctl before killing it
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Parse a saved `falconctl stats` report instead of running falconctl
    #[arg(long)]
    report_file: Option<PathBuf>,

    /// Verbosity level (0-3), logs go to stderr
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; stdout belongs to mackerel-agent
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let tempfile = cli.tempfile.filter(|p| !p.as_os_str().is_empty());

    match cli.report_file {
        Some(path) => {
            run(&cli.metric_key_prefix, ReportFile::new(path), tempfile).await?;
        }
        None => {
            let config = FalconctlConfig::default()
                .with_program(cli.falconctl)
                .with_timeout(Duration::from_secs(cli.timeout));
            run(&cli.metric_key_prefix, Falconctl::new(config), tempfile).await?;
        }
    }

    Ok(())
}

async fn run<S: ReportSource>(prefix: &str, source: S, tempfile: Option<PathBuf>) -> Result<()> {
    debug!("Reading sensor statistics from {}", source.describe());

    let plugin = MackerelPlugin::new(FalconPlugin::with_prefix(prefix, source)).with_tempfile(tempfile);

    let stdout = io::stdout();
    let mut handle = BufWriter::new(stdout.lock());

    plugin
        .run(&mut handle)
        .await
        .context("Falcon metrics collection failed")
}
