//! Pipeline metrics
//!
//! Two sinks for the same events: the `metrics` facade (scraped through the
//! Prometheus exporter) and an in-memory `StageMetricsAggregator` served by
//! the stats endpoint.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::StageKind;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use serde::Serialize;

/// Attach help text to every metric family, for the exporter
pub fn describe_metrics() {
    describe_counter!(
        "avatar_chat_stage_calls_total",
        "Calls to backend stages, by stage and status"
    );
    describe_histogram!(
        "avatar_chat_stage_latency_ms",
        Unit::Milliseconds,
        "Backend stage call latency"
    );
    describe_counter!(
        "avatar_chat_jobs_submitted_total",
        "Chat jobs accepted into the queue"
    );
    describe_counter!(
        "avatar_chat_jobs_rejected_total",
        "Chat submissions refused, by reason"
    );
    describe_counter!(
        "avatar_chat_jobs_finished_total",
        "Chat jobs reaching a terminal state, by outcome"
    );
    describe_gauge!("avatar_chat_jobs_in_flight", "Chat jobs currently running");
}

/// Record one stage invocation
pub fn record_stage_call(stage: StageKind, success: bool, elapsed_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "avatar_chat_stage_calls_total",
        "stage" => stage.as_str(),
        "status" => status
    )
    .increment(1);
    histogram!("avatar_chat_stage_latency_ms", "stage" => stage.as_str()).record(elapsed_ms);
}

/// Record an accepted submission
pub fn record_job_submitted() {
    counter!("avatar_chat_jobs_submitted_total").increment(1);
}

/// Record a rejected submission
pub fn record_job_rejected(reason: &'static str) {
    counter!("avatar_chat_jobs_rejected_total", "reason" => reason).increment(1);
}

/// Record a job reaching a terminal state
pub fn record_job_finished(outcome: &'static str) {
    counter!("avatar_chat_jobs_finished_total", "outcome" => outcome).increment(1);
}

/// Jobs currently holding a concurrency permit
pub fn set_jobs_in_flight(count: usize) {
    gauge!("avatar_chat_jobs_in_flight").set(count as f64);
}

/// In-memory aggregation of stage and job events
#[derive(Debug, Clone, Default)]
pub struct StageMetricsAggregator {
    pub jobs_submitted: u64,
    pub jobs_rejected: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_in_flight: usize,
    /// Per-stage call statistics
    pub stages: BTreeMap<StageKind, StageCallStats>,
}

/// Call counters and latency distribution for one stage
#[derive(Debug, Clone, Default)]
pub struct StageCallStats {
    pub successes: u64,
    pub failures: u64,
    pub latency_ms: RunningStats,
}

impl StageMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_stage(&mut self, stage: StageKind, success: bool, elapsed_ms: f64) {
        let stats = self.stages.entry(stage).or_default();
        if success {
            stats.successes += 1;
        } else {
            stats.failures += 1;
        }
        stats.latency_ms.push(elapsed_ms);
    }

    pub fn summary(&self) -> StageMetricsSummary {
        StageMetricsSummary {
            jobs_submitted: self.jobs_submitted,
            jobs_rejected: self.jobs_rejected,
            jobs_completed: self.jobs_completed,
            jobs_failed: self.jobs_failed,
            jobs_in_flight: self.jobs_in_flight,
            stages: self
                .stages
                .iter()
                .map(|(stage, stats)| {
                    (
                        stage.as_str().to_string(),
                        StageSummary {
                            successes: stats.successes,
                            failures: stats.failures,
                            latency_ms: StatsSummary::from(&stats.latency_ms),
                        },
                    )
                })
                .collect(),
        }
    }
}

/// Cloneable handle recording into both the facade and an aggregator
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    aggregator: Arc<Mutex<StageMetricsAggregator>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut StageMetricsAggregator) -> R) -> R {
        let mut guard = self
            .aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn stage_call(&self, stage: StageKind, success: bool, elapsed_ms: f64) {
        record_stage_call(stage, success, elapsed_ms);
        self.with(|agg| agg.update_stage(stage, success, elapsed_ms));
    }

    pub fn job_submitted(&self) {
        record_job_submitted();
        self.with(|agg| agg.jobs_submitted += 1);
    }

    pub fn job_rejected(&self, reason: &'static str) {
        record_job_rejected(reason);
        self.with(|agg| agg.jobs_rejected += 1);
    }

    /// A job started running
    pub fn job_started(&self) {
        let in_flight = self.with(|agg| {
            agg.jobs_in_flight += 1;
            agg.jobs_in_flight
        });
        set_jobs_in_flight(in_flight);
    }

    /// A job stopped running; `success` is false for the error state
    pub fn job_finished(&self, success: bool) {
        record_job_finished(if success { "completed" } else { "error" });
        let in_flight = self.with(|agg| {
            agg.jobs_in_flight = agg.jobs_in_flight.saturating_sub(1);
            if success {
                agg.jobs_completed += 1;
            } else {
                agg.jobs_failed += 1;
            }
            agg.jobs_in_flight
        });
        set_jobs_in_flight(in_flight);
    }

    pub fn summary(&self) -> StageMetricsSummary {
        self.with(|agg| agg.summary())
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageMetricsSummary {
    pub jobs_submitted: u64,
    pub jobs_rejected: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_in_flight: usize,
    pub stages: BTreeMap<String, StageSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSummary {
    pub successes: u64,
    pub failures: u64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for StageMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pipeline Metrics Summary ===")?;
        writeln!(
            f,
            "Jobs: {} submitted, {} rejected, {} completed, {} failed, {} running",
            self.jobs_submitted,
            self.jobs_rejected,
            self.jobs_completed,
            self.jobs_failed,
            self.jobs_in_flight
        )?;
        for (stage, summary) in &self.stages {
            writeln!(
                f,
                "  {stage}: ok={} failed={} latency(ms): {}",
                summary.successes, summary.failures, summary.latency_ms
            )?;
        }
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
