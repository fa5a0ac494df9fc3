//! Running per-dimension means across candidate nodes

use super::{DimensionAverages, DimensionFailure, FleetMetrics, NodeMetricVector};
use crate::dimension::MetricDimension;
use crate::error::QueryError;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    mean: f64,
    count: u32,
}

impl RunningMean {
    /// Incremental update; stays finite for any finite inputs that a plain sum would overflow.
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / f64::from(self.count);
    }
}

/// Outcome of offering a sample to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Accepted,
    /// Node is not part of this request's candidate set
    UnknownNode,
    /// Node already has a sample for this dimension
    Duplicate,
}

/// Collects samples for a fixed candidate set and derives fleet averages
#[derive(Debug)]
pub struct FleetAggregator {
    nodes: HashMap<String, NodeMetricVector>,
    means: [RunningMean; MetricDimension::COUNT],
    failures: Vec<DimensionFailure>,
}

impl FleetAggregator {
    pub fn new(candidates: &[String]) -> Self {
        Self {
            nodes: candidates
                .iter()
                .map(|name| (name.clone(), NodeMetricVector::default()))
                .collect(),
            means: [RunningMean::default(); MetricDimension::COUNT],
            failures: Vec::new(),
        }
    }

    /// Record one parsed sample. Only the first sample per node and dimension counts.
    pub fn record(&mut self, dimension: MetricDimension, node: &str, value: f64) -> Recorded {
        let Some(vector) = self.nodes.get_mut(node) else {
            return Recorded::UnknownNode;
        };
        if vector.get(dimension).is_some() {
            return Recorded::Duplicate;
        }

        vector.set(dimension, value);
        self.means[dimension.index()].push(value);
        Recorded::Accepted
    }

    pub fn record_failure(&mut self, dimension: MetricDimension, error: QueryError) {
        self.failures.push(DimensionFailure { dimension, error });
    }

    pub fn finish(self) -> FleetMetrics {
        let mut averages = DimensionAverages::default();
        for dimension in MetricDimension::ALL {
            let running = self.means[dimension.index()];
            if running.count > 0 && running.mean.is_finite() {
                averages.set(dimension, running.mean);
            }
        }

        FleetMetrics {
            nodes: self.nodes,
            averages,
            failures: self.failures,
        }
    }
}
