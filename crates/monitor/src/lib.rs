//! Drowsiness Monitor
//!
//! Replays recorded facial-landmark traces through the DMS engine, latches
//! alerts and writes one JSON snapshot per frame.

pub mod replay;
pub mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use alerting::{AlertConfig, AlertEvent, AlertManager};
use anyhow::{Context, Result};
use dms::{AlertMode, DmsAnalysis, DmsConfig, DmsModule};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use replay::{spawn_reader, TraceDetector};
use store::ThresholdStore;

/// Monitor run options
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    /// Trace file; stdin when `None`
    pub trace: Option<PathBuf>,
    /// DMS configuration file
    pub config: Option<PathBuf>,
    /// Where the calibrated threshold is loaded from and saved to
    pub threshold_file: Option<PathBuf>,
    /// Ignore a stored threshold and calibrate again
    pub recalibrate: bool,
    /// Alert latch configuration
    pub alert: AlertConfig,
}

/// One output line
#[derive(Debug, Serialize)]
pub struct FrameReport<'a> {
    pub t_ms: u64,
    #[serde(flatten)]
    pub analysis: &'a DmsAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_event: Option<AlertEvent>,
    /// Whether an alarm should be sounding
    pub alarm: bool,
}

/// Totals for a finished replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub total_blinks: u32,
    pub alerts_raised: usize,
    pub final_threshold: f64,
}

/// Initialize logging
pub fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Serve Prometheus metrics on `addr`
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing Prometheus exporter")?;
    info!("Serving metrics on {}", addr);
    Ok(())
}

fn mode_code(mode: AlertMode) -> f64 {
    match mode {
        AlertMode::Default => 0.0,
        AlertMode::Tired => 1.0,
        AlertMode::Drowsy => 2.0,
        AlertMode::Distracted => 3.0,
        AlertMode::Sleeping => 4.0,
    }
}

fn record_metrics(analysis: &DmsAnalysis, new_blinks: u32, event: Option<&AlertEvent>) {
    metrics::counter!("dms_frames_total").increment(1);
    if new_blinks > 0 {
        metrics::counter!("dms_blinks_total").increment(u64::from(new_blinks));
    }
    if let Some(ear) = analysis.ear {
        metrics::gauge!("dms_ear").set(ear);
    }
    metrics::gauge!("dms_mode").set(mode_code(analysis.mode));
    match event {
        Some(AlertEvent::Raised(alert)) | Some(AlertEvent::Changed { to: alert, .. }) => {
            metrics::counter!("dms_alerts_total", "alert" => alert.as_str()).increment(1);
        }
        _ => {}
    }
}

/// Build the engine, resuming from a stored threshold when allowed
fn build_engine(options: &MonitorOptions, store: Option<&ThresholdStore>) -> Result<DmsModule> {
    let config = DmsConfig::load(options.config.as_deref())?;

    let stored = match store {
        Some(store) if !options.recalibrate => store.load()?,
        _ => None,
    };

    let engine = match stored {
        Some(threshold) => DmsModule::with_threshold(config, threshold)?,
        None => DmsModule::new(config)?,
    };
    Ok(engine)
}

/// Replay a trace and write one JSON line per frame to `out`
pub async fn run_replay<W>(options: MonitorOptions, mut out: W) -> Result<ReplaySummary>
where
    W: AsyncWrite + Unpin,
{
    let store = options.threshold_file.clone().map(ThresholdStore::new);
    let mut engine = build_engine(&options, store.as_ref())?;
    let mut alerts = AlertManager::new(options.alert.clone());
    let mut detector = TraceDetector;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &options.trace {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening trace {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let (mut frames, reader_task) = spawn_reader(reader);

    let base = Instant::now();
    let mut summary = ReplaySummary::default();
    let mut blinks_seen = 0u32;

    while let Some(record) = frames.recv().await {
        let now = base + Duration::from_millis(record.t_ms);
        let analysis = engine
            .analyze(&mut detector, &record, now)
            .with_context(|| format!("frame at t={}ms", record.t_ms))?;

        if let (Some(threshold), Some(store)) = (analysis.calibrated_threshold, store.as_ref()) {
            if let Err(e) = store.save(threshold) {
                warn!("Could not persist calibrated threshold: {:#}", e);
            }
        }

        let event = alerts.update(analysis.highest_severity_alert(), now);
        if matches!(event, Some(AlertEvent::Raised(_))) {
            summary.alerts_raised += 1;
        }

        let new_blinks = analysis.total_blinks.saturating_sub(blinks_seen);
        blinks_seen = analysis.total_blinks;
        record_metrics(&analysis, new_blinks, event.as_ref());

        let report = FrameReport {
            t_ms: record.t_ms,
            analysis: &analysis,
            alert_event: event,
            alarm: alerts.is_sounding(),
        };
        let mut line = serde_json::to_vec(&report)?;
        line.push(b'\n');
        out.write_all(&line).await?;

        summary.frames += 1;
        summary.total_blinks = analysis.total_blinks;
    }
    out.flush().await?;

    let sent = reader_task.await.context("trace reader panicked")??;
    summary.final_threshold = engine.ear_threshold();
    info!(
        "Replay finished: {} frames ({} read), {} blinks, {} alerts, EAR threshold {:.3}",
        summary.frames, sent, summary.total_blinks, summary.alerts_raised, summary.final_threshold
    );
    Ok(summary)
}
