//! Prometheus HTTP API client
//!
//! Issues one instant query per dimension, all dimensions concurrently.
//! Each query is bounded by the configured timeout; a dimension whose query
//! fails is recorded as a failure and left absent for every node.

use super::{async_trait, FleetAggregator, FleetMetrics, MetricsSource, Recorded};
use crate::dimension::MetricDimension;
use crate::error::QueryError;
use crate::observability::{ExtenderMetrics, StructuredLogger};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

/// Longest backend error body kept in a [`QueryError`]
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for the monitoring backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the Prometheus-compatible API
    pub base_url: String,
    /// Per-query timeout in milliseconds
    pub query_timeout_ms: u64,
    /// Series label carrying the node identifier
    pub node_label: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://orchestrator-service.default.svc.cluster.local:9090".to_string(),
            query_timeout_ms: 5000,
            node_label: "node_id".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// `{base_url}/api/v1/query`, keeping any path prefix on the base URL
    pub fn query_url(&self) -> Result<Url> {
        let mut base = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid backend URL: {}", self.base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join("api/v1/query")
            .with_context(|| format!("Cannot build query URL from {}", self.base_url))
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: HashMap<String, String>,
    /// `[timestamp, value]`
    #[serde(default)]
    value: Vec<Value>,
}

/// Parse a sample value that may be a JSON number or a numeric string.
///
/// Non-finite values are rejected so they cannot poison fleet averages.
pub fn parse_sample_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// [`MetricsSource`] backed by the Prometheus HTTP API
pub struct PrometheusSource {
    client: Client,
    query_url: Url,
    node_label: String,
    metrics: ExtenderMetrics,
    logger: StructuredLogger,
}

impl PrometheusSource {
    pub fn new(
        config: &BackendConfig,
        metrics: ExtenderMetrics,
        logger: StructuredLogger,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.query_timeout())
            .connect_timeout(config.query_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            query_url: config.query_url()?,
            node_label: config.node_label.clone(),
            metrics,
            logger,
        })
    }

    fn absorb(
        &self,
        aggregator: &mut FleetAggregator,
        dimension: MetricDimension,
        series: Vec<VectorSample>,
    ) {
        for sample in series {
            let Some(node) = sample.metric.get(&self.node_label) else {
                debug!(dimension = %dimension, "Series without node label ignored");
                continue;
            };

            let Some(value) = sample.value.get(1).and_then(parse_sample_value) else {
                let raw = sample
                    .value
                    .get(1)
                    .map(Value::to_string)
                    .unwrap_or_else(|| "<missing>".to_string());
                self.logger.log_sample_rejected(dimension, node, &raw);
                continue;
            };

            match aggregator.record(dimension, node, value) {
                Recorded::Accepted => {}
                Recorded::Duplicate => {
                    debug!(dimension = %dimension, node = %node, "Duplicate series ignored")
                }
                Recorded::UnknownNode => {
                    debug!(dimension = %dimension, node = %node, "Series for non-candidate node ignored")
                }
            }
        }
    }
}

async fn run_query(client: Client, url: Url, query: String) -> Result<Vec<VectorSample>, QueryError> {
    let response = client
        .get(url)
        .query(&[("query", query.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        return Err(QueryError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    let payload: QueryResponse =
        serde_json::from_slice(&bytes).map_err(|e| QueryError::Decode(e.to_string()))?;

    if payload.status != "success" {
        return Err(QueryError::NotSuccess {
            status: payload.status,
            message: payload.error.unwrap_or_default(),
        });
    }

    Ok(payload.data.map(|data| data.result).unwrap_or_default())
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    async fn fetch(&self, nodes: &[String]) -> FleetMetrics {
        let mut aggregator = FleetAggregator::new(nodes);
        if nodes.is_empty() {
            return aggregator.finish();
        }

        // Dropping the set (e.g. the caller went away) aborts outstanding queries.
        let mut queries = JoinSet::new();
        for dimension in MetricDimension::ALL {
            let query = dimension.query(&self.node_label, nodes);
            let client = self.client.clone();
            let url = self.query_url.clone();
            queries.spawn(async move {
                let started = Instant::now();
                let outcome = run_query(client, url, query).await;
                (dimension, outcome, started.elapsed())
            });
        }

        let mut settled = [false; MetricDimension::COUNT];
        while let Some(joined) = queries.join_next().await {
            let (dimension, outcome, elapsed) = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "Dimension query task failed");
                    continue;
                }
            };
            settled[dimension.index()] = true;
            self.metrics
                .observe_backend_query(dimension, elapsed.as_secs_f64());

            match outcome {
                Ok(series) => self.absorb(&mut aggregator, dimension, series),
                Err(error) => {
                    self.metrics
                        .inc_backend_query_failure(dimension, error.reason());
                    self.logger.log_dimension_failure(dimension, &error);
                    aggregator.record_failure(dimension, error);
                }
            }
        }

        for dimension in MetricDimension::ALL {
            if !settled[dimension.index()] {
                let error = QueryError::Aborted("task did not report".to_string());
                self.metrics
                    .inc_backend_query_failure(dimension, error.reason());
                self.logger.log_dimension_failure(dimension, &error);
                aggregator.record_failure(dimension, error);
            }
        }

        aggregator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn source_for(server: &Server, timeout_ms: u64) -> PrometheusSource {
        let config = BackendConfig {
            base_url: server.url(),
            query_timeout_ms: timeout_ms,
            node_label: "node_id".to_string(),
        };
        PrometheusSource::new(
            &config,
            ExtenderMetrics::new(),
            StructuredLogger::new("test"),
        )
        .unwrap()
    }

    fn vector_body(samples: &[(&str, Value)]) -> String {
        let result: Vec<Value> = samples
            .iter()
            .map(|(node, value)| {
                json!({
                    "metric": { "__name__": "ignored", "node_id": node },
                    "value": [1742038979.123, value]
                })
            })
            .collect();
        json!({
            "status": "success",
            "data": { "resultType": "vector", "result": result }
        })
        .to_string()
    }

    fn nodes() -> Vec<String> {
        vec!["node-a".to_string(), "node-b".to_string()]
    }

    #[test]
    fn test_parse_sample_value_accepts_numbers_and_strings() {
        assert_eq!(parse_sample_value(&json!(12.5)), Some(12.5));
        assert_eq!(parse_sample_value(&json!("12.5")), Some(12.5));
        assert_eq!(parse_sample_value(&json!(" 3 ")), Some(3.0));
        assert_eq!(parse_sample_value(&json!(7)), Some(7.0));
    }

    #[test]
    fn test_parse_sample_value_rejects_garbage() {
        assert_eq!(parse_sample_value(&json!("lots")), None);
        assert_eq!(parse_sample_value(&json!("NaN")), None);
        assert_eq!(parse_sample_value(&json!("+Inf")), None);
        assert_eq!(parse_sample_value(&json!(null)), None);
        assert_eq!(parse_sample_value(&json!([1])), None);
    }

    #[test]
    fn test_query_url_keeps_path_prefix() {
        let config = BackendConfig {
            base_url: "http://prom.monitoring:9090/prometheus".to_string(),
            ..BackendConfig::default()
        };
        assert_eq!(
            config.query_url().unwrap().as_str(),
            "http://prom.monitoring:9090/prometheus/api/v1/query"
        );

        let config = BackendConfig::default();
        assert_eq!(
            config.query_url().unwrap().as_str(),
            "http://orchestrator-service.default.svc.cluster.local:9090/api/v1/query"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = BackendConfig {
            base_url: "not a url".to_string(),
            ..BackendConfig::default()
        };
        assert!(config.query_url().is_err());
    }

    #[tokio::test]
    async fn test_fetch_issues_one_query_per_dimension() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for dimension in MetricDimension::ALL {
            let query = dimension.query("node_id", &nodes());
            let mock = server
                .mock("GET", "/api/v1/query")
                .match_query(Matcher::UrlEncoded("query".into(), query))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(vector_body(&[("node-a", json!("10")), ("node-b", json!(30))]))
                .expect(1)
                .create_async()
                .await;
            mocks.push(mock);
        }

        let fleet = source_for(&server, 2000).fetch(&nodes()).await;

        for mock in &mocks {
            mock.assert_async().await;
        }
        assert!(fleet.failures.is_empty());
        for dimension in MetricDimension::ALL {
            assert_eq!(fleet.averages.get(dimension), Some(20.0));
            assert_eq!(fleet.vector("node-a").get(dimension), Some(10.0));
            assert_eq!(fleet.vector("node-b").get(dimension), Some(30.0));
        }
    }

    #[tokio::test]
    async fn test_failed_dimension_does_not_abort_others() {
        let mut server = Server::new_async().await;
        let page_faults = MetricDimension::PageFaults.query("node_id", &nodes());

        let _broken = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::UrlEncoded("query".into(), page_faults))
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;
        let _healthy = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Regex("^query=(mem|ctx|fs)_".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vector_body(&[("node-a", json!("4"))]))
            .create_async()
            .await;

        let fleet = source_for(&server, 2000).fetch(&nodes()).await;

        let failed: Vec<_> = fleet.failed_dimensions().collect();
        assert_eq!(failed, vec![MetricDimension::PageFaults]);
        assert!(matches!(
            fleet.failures[0].error,
            QueryError::Status { status: 503, .. }
        ));
        assert_eq!(fleet.averages.get(MetricDimension::PageFaults), None);
        assert_eq!(fleet.averages.get(MetricDimension::FsWriteCount), Some(4.0));
        assert_eq!(fleet.vector("node-b").get(MetricDimension::FsWriteCount), None);
    }

    #[tokio::test]
    async fn test_non_success_status_fails_every_dimension() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"error","errorType":"execution","error":"boom"}"#)
            .expect(MetricDimension::COUNT)
            .create_async()
            .await;

        let fleet = source_for(&server, 2000).fetch(&nodes()).await;

        mock.assert_async().await;

        assert_eq!(fleet.failures.len(), MetricDimension::COUNT);
        assert!(fleet
            .failures
            .iter()
            .all(|f| matches!(f.error, QueryError::NotSuccess { .. })));
        assert!(fleet.vector("node-a").is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_a_dimension_failure() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let fleet = source_for(&server, 2000).fetch(&nodes()).await;

        assert_eq!(fleet.failures.len(), MetricDimension::COUNT);
        assert!(fleet
            .failures
            .iter()
            .all(|f| matches!(f.error, QueryError::Decode(_))));
    }

    #[tokio::test]
    async fn test_bad_sample_only_drops_that_node() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vector_body(&[
                ("node-a", json!("not-a-number")),
                ("node-b", json!("8")),
                ("node-z", json!("1000")),
            ]))
            .create_async()
            .await;

        let fleet = source_for(&server, 2000).fetch(&nodes()).await;

        assert!(fleet.failures.is_empty());
        let dim = MetricDimension::AllocatedMemoryBytes;
        assert_eq!(fleet.vector("node-a").get(dim), None);
        assert_eq!(fleet.vector("node-b").get(dim), Some(8.0));
        assert_eq!(fleet.averages.get(dim), Some(8.0));
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades_to_failures() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            query_timeout_ms: 500,
            node_label: "node_id".to_string(),
        };
        let source = PrometheusSource::new(
            &config,
            ExtenderMetrics::new(),
            StructuredLogger::new("test"),
        )
        .unwrap();

        let fleet = source.fetch(&nodes()).await;

        assert_eq!(fleet.failures.len(), MetricDimension::COUNT);
        assert_eq!(fleet.nodes.len(), 2);
    }

    /// Accepts connections and never answers. Counts accepted and closed sockets.
    async fn silent_backend() -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let (accepted_in, closed_in) = (accepted.clone(), closed.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                accepted_in.fetch_add(1, Ordering::SeqCst);
                let closed = closed_in.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                    }
                    closed.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        (format!("http://{}", addr), accepted, closed)
    }

    async fn wait_for(counter: &AtomicUsize, target: usize) -> bool {
        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) >= target {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    fn source_at(base_url: String, timeout_ms: u64) -> PrometheusSource {
        let config = BackendConfig {
            base_url,
            query_timeout_ms: timeout_ms,
            node_label: "node_id".to_string(),
        };
        PrometheusSource::new(
            &config,
            ExtenderMetrics::new(),
            StructuredLogger::new("test"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_each_dimension_concurrently() {
        let (base_url, accepted, _) = silent_backend().await;
        let source = source_at(base_url, 400);

        let started = Instant::now();
        let fleet = source.fetch(&nodes()).await;
        let elapsed = started.elapsed();

        assert_eq!(accepted.load(Ordering::SeqCst), MetricDimension::COUNT);
        assert_eq!(fleet.failures.len(), MetricDimension::COUNT);
        assert!(fleet.failures.iter().all(|f| f.error.reason() == "timeout"));
        assert!(elapsed >= Duration::from_millis(400));
        // Sequential queries would need eight timeouts
        assert!(elapsed < Duration::from_millis(1600), "took {elapsed:?}");
        assert_eq!(fleet.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_fetch_closes_outstanding_queries() {
        let (base_url, accepted, closed) = silent_backend().await;
        let source = Arc::new(source_at(base_url, 30_000));

        let fetch = tokio::spawn({
            let source = source.clone();
            async move { source.fetch(&nodes()).await }
        });
        assert!(wait_for(&accepted, MetricDimension::COUNT).await);
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        fetch.abort();
        assert!(fetch.await.unwrap_err().is_cancelled());

        assert!(
            wait_for(&closed, MetricDimension::COUNT).await,
            "only {} of {} queries closed",
            closed.load(Ordering::SeqCst),
            MetricDimension::COUNT
        );
    }
}
