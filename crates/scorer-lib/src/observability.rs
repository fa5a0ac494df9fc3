//! Observability infrastructure for the scheduler extender
//!
//! Provides:
//! - Prometheus metrics (request outcomes and latency, backend query latency and
//!   failures, score distribution)
//! - Structured JSON logging with tracing

use crate::dimension::MetricDimension;
use crate::error::QueryError;
use crate::scoring::ScoreBreakdown;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Histogram, HistogramVec, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for request and backend latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const SCORE_BUCKETS: &[f64] = &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExtenderMetricsInner> = OnceLock::new();

struct ExtenderMetricsInner {
    requests_total: IntCounterVec,
    request_latency_seconds: HistogramVec,
    backend_query_latency_seconds: HistogramVec,
    backend_query_failures: IntCounterVec,
    nodes_scored: IntCounter,
    node_score: Histogram,
}

impl ExtenderMetricsInner {
    fn new() -> Self {
        Self {
            requests_total: register_int_counter_vec!(
                "scheduler_extender_requests_total",
                "Extender requests by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register requests_total"),

            request_latency_seconds: register_histogram_vec!(
                "scheduler_extender_request_latency_seconds",
                "Time spent handling a scheduler callback",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            backend_query_latency_seconds: register_histogram_vec!(
                "scheduler_extender_backend_query_latency_seconds",
                "Latency of one dimension query against the monitoring backend",
                &["dimension"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register backend_query_latency_seconds"),

            backend_query_failures: register_int_counter_vec!(
                "scheduler_extender_backend_query_failures_total",
                "Dimension queries that were dropped from scoring",
                &["dimension", "reason"]
            )
            .expect("Failed to register backend_query_failures"),

            nodes_scored: register_int_counter!(
                "scheduler_extender_nodes_scored_total",
                "Total number of node scores returned to the scheduler"
            )
            .expect("Failed to register nodes_scored"),

            node_score: register_histogram!(
                "scheduler_extender_node_score",
                "Distribution of final node scores",
                SCORE_BUCKETS.to_vec()
            )
            .expect("Failed to register node_score"),
        }
    }
}

/// Extender metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct ExtenderMetrics {
    _private: (),
}

impl Default for ExtenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtenderMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExtenderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExtenderMetricsInner {
        GLOBAL_METRICS.get_or_init(ExtenderMetricsInner::new)
    }

    /// Count a finished request, `outcome` is `ok` or an error code
    pub fn inc_request(&self, operation: &str, outcome: &str) {
        self.inner()
            .requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn observe_request_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .request_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn observe_backend_query(&self, dimension: MetricDimension, duration_secs: f64) {
        self.inner()
            .backend_query_latency_seconds
            .with_label_values(&[dimension.metric_name()])
            .observe(duration_secs);
    }

    pub fn inc_backend_query_failure(&self, dimension: MetricDimension, reason: &str) {
        self.inner()
            .backend_query_failures
            .with_label_values(&[dimension.metric_name(), reason])
            .inc();
    }

    pub fn observe_node_score(&self, score: i64) {
        self.inner().nodes_scored.inc();
        self.inner().node_score.observe(score as f64);
    }
}

/// Structured logger for extender events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// One line per scored node
    pub fn log_node_score(&self, pod: &str, node: &str, breakdown: &ScoreBreakdown) {
        info!(
            event = "node_scored",
            instance = %self.instance,
            pod = %pod,
            node = %node,
            score = breakdown.score,
            memory = breakdown.memory,
            cpu = breakdown.cpu,
            filesystem = breakdown.filesystem,
            "Scored node"
        );
    }

    pub fn log_dimension_failure(&self, dimension: MetricDimension, error: &QueryError) {
        warn!(
            event = "dimension_query_failed",
            instance = %self.instance,
            dimension = %dimension,
            reason = error.reason(),
            error = %error,
            "Dimension query failed, scoring it as neutral"
        );
    }

    pub fn log_sample_rejected(&self, dimension: MetricDimension, node: &str, raw: &str) {
        debug!(
            event = "sample_rejected",
            instance = %self.instance,
            dimension = %dimension,
            node = %node,
            raw = %raw,
            "Unparseable sample value"
        );
    }

    pub fn log_request_rejected(&self, operation: &str, code: &str, message: &str) {
        warn!(
            event = "request_rejected",
            instance = %self.instance,
            operation = %operation,
            code = %code,
            message = %message,
            "Rejected scheduler request"
        );
    }

    pub fn log_startup(&self, version: &str, port: u16, backend: &str) {
        info!(
            event = "extender_started",
            instance = %self.instance,
            version = %version,
            port = port,
            backend = %backend,
            "Scheduler extender started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "extender_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Scheduler extender shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extender_metrics_creation() {
        let metrics = ExtenderMetrics::new();
        let again = ExtenderMetrics::new();

        metrics.inc_request("prioritize", "ok");
        metrics.observe_request_latency("prioritize", 0.01);
        again.observe_backend_query(MetricDimension::PageFaults, 0.002);
        again.inc_backend_query_failure(MetricDimension::PageFaults, "timeout");
        metrics.observe_node_score(54);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "scheduler_extender_backend_query_failures_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("extender-0");
        assert_eq!(logger.instance, "extender-0");
    }
}
