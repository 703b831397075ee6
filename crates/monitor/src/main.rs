//! Drowsiness Monitor - Main Entry Point

use std::net::SocketAddr;
use std::path::PathBuf;

use alerting::AlertConfig;
use clap::Parser;
use monitor::{init_logging, init_metrics, run_replay, MonitorOptions};
use tracing::info;

/// Replay a facial-landmark trace through the drowsiness engine
#[derive(Parser, Debug)]
#[command(name = "drowsiness-monitor", version, about)]
struct Cli {
    /// JSON-lines landmark trace (reads stdin if omitted)
    trace: Option<PathBuf>,

    /// Engine configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File holding the calibrated EAR threshold
    #[arg(long)]
    threshold_file: Option<PathBuf>,

    /// Ignore the stored threshold and calibrate again
    #[arg(long)]
    recalibrate: bool,

    /// Seconds an alarm keeps sounding after its condition clears
    #[arg(long, default_value_t = 2.0)]
    stop_delay: f64,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = cli.metrics_addr {
        init_metrics(addr)?;
    }

    let options = MonitorOptions {
        trace: cli.trace,
        config: cli.config,
        threshold_file: cli.threshold_file,
        recalibrate: cli.recalibrate,
        alert: AlertConfig {
            stop_delay_secs: cli.stop_delay,
        },
    };

    run_replay(options, tokio::io::stdout()).await?;
    Ok(())
}
