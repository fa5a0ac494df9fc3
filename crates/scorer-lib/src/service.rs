//! Request orchestration for the filter and prioritize callbacks
//!
//! Transport-agnostic: the HTTP layer decodes bodies into [`ExtenderArgs`]
//! and hands them here.

use crate::error::ExtenderError;
use crate::health::HealthRegistry;
use crate::metrics::MetricsSource;
use crate::models::{ExtenderArgs, ExtenderFilterResult, HostPriority, HostPriorityList};
use crate::observability::{ExtenderMetrics, StructuredLogger};
use crate::scoring::{score_node, ScoringPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub mod operations {
    pub const FILTER: &str = "filter";
    pub const PRIORITIZE: &str = "prioritize";
}

/// Scores candidate nodes for one scheduling decision at a time.
///
/// Holds only read-only configuration and shared handles, so one instance
/// serves any number of concurrent requests.
#[derive(Clone)]
pub struct ScoringService {
    source: Arc<dyn MetricsSource>,
    policy: Arc<ScoringPolicy>,
    health: HealthRegistry,
    metrics: ExtenderMetrics,
    logger: StructuredLogger,
}

impl ScoringService {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        policy: ScoringPolicy,
        health: HealthRegistry,
        metrics: ExtenderMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            policy: Arc::new(policy),
            health,
            metrics,
            logger,
        }
    }

    /// Admission pass-through: echo the candidates, fail none.
    pub fn filter(&self, args: ExtenderArgs) -> Result<ExtenderFilterResult, ExtenderError> {
        let started = Instant::now();
        let result = args.candidate_names().map(|names| {
            debug!(pod = %args.pod.identity(), candidates = names.len(), "Admitting all candidates");
            ExtenderFilterResult {
                nodes: args.nodes,
                node_names: args.node_names,
                failed_nodes: HashMap::new(),
                error: None,
            }
        });
        self.finish(operations::FILTER, started, &result);
        result
    }

    /// Fetch metrics for every candidate and score each one.
    pub async fn prioritize(&self, args: &ExtenderArgs) -> Result<HostPriorityList, ExtenderError> {
        let started = Instant::now();
        let result = self.score_candidates(args).await;
        self.finish(operations::PRIORITIZE, started, &result);
        result
    }

    async fn score_candidates(&self, args: &ExtenderArgs) -> Result<HostPriorityList, ExtenderError> {
        let candidates = args.candidate_names()?;
        let pod = args.pod.identity();

        let fleet = self.source.fetch(&candidates).await;
        let failed: Vec<_> = fleet.failed_dimensions().collect();
        self.health.record_backend_fetch(&failed).await;

        let mut priorities: Vec<HostPriority> = candidates
            .into_iter()
            .map(|host| {
                let breakdown = score_node(&fleet.vector(&host), &fleet.averages, &self.policy);
                self.logger.log_node_score(&pod, &host, &breakdown);
                self.metrics.observe_node_score(breakdown.score);
                HostPriority {
                    host,
                    score: breakdown.score,
                }
            })
            .collect();

        priorities.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.host.cmp(&b.host)));

        Ok(HostPriorityList {
            host_priority_list: priorities,
        })
    }

    fn finish<T>(&self, operation: &str, started: Instant, result: &Result<T, ExtenderError>) {
        self.record_outcome(operation, started, result.as_ref().err());
    }

    /// Count and log one request. Also used by transports for bodies that never decode.
    pub fn record_outcome(&self, operation: &str, started: Instant, error: Option<&ExtenderError>) {
        self.metrics
            .observe_request_latency(operation, started.elapsed().as_secs_f64());
        match error {
            None => self.metrics.inc_request(operation, "ok"),
            Some(e) => {
                self.metrics.inc_request(operation, e.code());
                self.logger
                    .log_request_rejected(operation, e.code(), &e.to_string());
            }
        }
    }
}
