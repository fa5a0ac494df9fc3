//! Per-request node metrics from the monitoring backend
//!
//! A [`MetricsSource`] resolves every [`MetricDimension`] for a set of
//! candidate nodes and returns the samples together with the cross-node
//! averages the scoring engine normalizes against. Failures never abort a
//! fetch: a failed dimension is simply absent.

mod aggregate;
mod backend;

pub use aggregate::{FleetAggregator, Recorded};
pub use backend::{parse_sample_value, BackendConfig, PrometheusSource};

pub use async_trait::async_trait;

use crate::dimension::MetricDimension;
use crate::error::QueryError;
use std::collections::HashMap;

/// Samples for one node, indexed by dimension. Absent means no data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeMetricVector {
    samples: [Option<f64>; MetricDimension::COUNT],
}

impl NodeMetricVector {
    pub fn get(&self, dimension: MetricDimension) -> Option<f64> {
        self.samples[dimension.index()]
    }

    pub fn set(&mut self, dimension: MetricDimension, value: f64) {
        self.samples[dimension.index()] = Some(value);
    }

    pub fn with(mut self, dimension: MetricDimension, value: f64) -> Self {
        self.set(dimension, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(Option::is_none)
    }
}

/// Cross-node mean per dimension. `None` when no node reported it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DimensionAverages {
    averages: [Option<f64>; MetricDimension::COUNT],
}

impl DimensionAverages {
    pub fn get(&self, dimension: MetricDimension) -> Option<f64> {
        self.averages[dimension.index()]
    }

    pub fn set(&mut self, dimension: MetricDimension, average: f64) {
        self.averages[dimension.index()] = Some(average);
    }

    pub fn with(mut self, dimension: MetricDimension, average: f64) -> Self {
        self.set(dimension, average);
        self
    }
}

/// A dimension that could not be fetched for this request
#[derive(Debug)]
pub struct DimensionFailure {
    pub dimension: MetricDimension,
    pub error: QueryError,
}

/// Everything the scoring engine needs for one request
#[derive(Debug, Default)]
pub struct FleetMetrics {
    pub nodes: HashMap<String, NodeMetricVector>,
    pub averages: DimensionAverages,
    pub failures: Vec<DimensionFailure>,
}

impl FleetMetrics {
    /// Vector for a node; all-absent if the node never reported
    pub fn vector(&self, node: &str) -> NodeMetricVector {
        self.nodes.get(node).copied().unwrap_or_default()
    }

    pub fn failed_dimensions(&self) -> impl Iterator<Item = MetricDimension> + '_ {
        self.failures.iter().map(|f| f.dimension)
    }
}

/// Source of node metrics for a scoring request
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch every dimension for the given nodes. Never fails as a whole.
    async fn fetch(&self, nodes: &[String]) -> FleetMetrics;
}
