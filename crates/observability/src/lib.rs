//! # Observability
//!
//! Logging and metrics for the avatar chat service.
//!
//! ## Features
//!
//! - `tracing` subscriber setup, honouring `RUST_LOG`
//! - Prometheus exporter with described metric families
//! - Stage latency and job outcome metrics, with an in-memory aggregate
//!   served by the stats endpoint
//!
//! ## Usage
//!
//! ```ignore
//! use observability::{LogFormat, ObservabilityConfig, PipelineMetrics};
//!
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//! observability::install_prometheus(9000)?;
//!
//! let metrics = PipelineMetrics::new();
//! metrics.stage_call(StageKind::Tts, true, 1830.0);
//! println!("{}", metrics.summary());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    describe_metrics, record_job_finished, record_job_rejected, record_job_submitted,
    record_stage_call, set_jobs_in_flight, PipelineMetrics, RunningStats, StageCallStats,
    StageMetricsAggregator, StageMetricsSummary, StageSummary, StatsSummary,
};

/// Observability settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port; `None` or `Some(0)` leaves the exporter off
    pub metrics_port: Option<u16>,
    /// Filter used when RUST_LOG is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON, one object per line
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

/// Install the global subscriber, then the exporter if a port is given
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    tracing_subscriber::registry()
        .with(fmt_layer(config.log_format))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::info!(
        log_format = ?config.log_format,
        default_log_level = %config.default_log_level,
        "Logging initialized"
    );

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }
    Ok(())
}

/// Serve Prometheus metrics on `0.0.0.0:port`. Returns false when the
/// port is 0 and nothing was installed.
pub fn install_prometheus(port: u16) -> Result<bool> {
    if port == 0 {
        tracing::info!("Prometheus exporter disabled");
        return Ok(false);
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("Failed to install Prometheus exporter on port {port}"))?;
    describe_metrics();

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(true)
}
