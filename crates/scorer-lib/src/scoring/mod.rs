//! Node scoring engine
//!
//! Converts a node's raw samples into a single score in `[0, 100]`. Each
//! dimension is compared against the cross-node average for the same
//! request, normalized between the policy cutoffs, and combined through the
//! fixed category weights. Higher scores mean less relative load.
//!
//! Everything here is pure: identical inputs always give the same score.

mod policy;

pub use policy::{
    CategoryWeights, CpuWeights, Cutoffs, FilesystemWeights, MemoryWeights, ScoringPolicy,
};

use crate::dimension::{Category, MetricDimension};
use crate::metrics::{DimensionAverages, NodeMetricVector};
use serde::Serialize;

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;

/// Absorbs floating-point drift before the final score is truncated
const TRUNCATION_TOLERANCE: f64 = 1e-9;

/// Map a load ratio onto `[0, 1]` between two cutoffs.
///
/// At or below `min_cutoff` there is no pressure (0), at or above
/// `max_cutoff` the node is saturated (1). NaN counts as no pressure.
pub fn normalize(ratio: f64, min_cutoff: f64, max_cutoff: f64) -> f64 {
    if ratio.is_nan() || ratio <= min_cutoff {
        return 0.0;
    }
    if ratio >= max_cutoff {
        return 1.0;
    }
    ((ratio - min_cutoff) / (max_cutoff - min_cutoff)).clamp(0.0, 1.0)
}

/// Score for one dimension in `[0, 100]`, neutral when data is missing.
pub fn dimension_score(sample: Option<f64>, average: Option<f64>, policy: &ScoringPolicy) -> f64 {
    match (sample, average) {
        (Some(sample), Some(average))
            if average > 0.0 && average.is_finite() && sample.is_finite() =>
        {
            let ratio = sample / average;
            100.0 * (1.0 - normalize(ratio, policy.cutoffs.min_ratio, policy.cutoffs.max_ratio))
        }
        _ => policy.neutral_score,
    }
}

/// Category and final scores for one node
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub memory: f64,
    pub cpu: f64,
    pub filesystem: f64,
    pub score: i64,
}

/// Score one node against the fleet averages of the same request.
pub fn score_node(
    vector: &NodeMetricVector,
    averages: &DimensionAverages,
    policy: &ScoringPolicy,
) -> ScoreBreakdown {
    let mut categories = [0.0_f64; Category::COUNT];

    for dimension in MetricDimension::ALL {
        let sub_score = dimension_score(vector.get(dimension), averages.get(dimension), policy);
        let slot = category_slot(dimension.category());
        categories[slot] += sub_score * policy.weight_within_category(dimension);
    }

    let weighted: f64 = Category::ALL
        .iter()
        .map(|c| categories[category_slot(*c)] * policy.category_weight(*c))
        .sum();

    ScoreBreakdown {
        memory: categories[category_slot(Category::Memory)],
        cpu: categories[category_slot(Category::Cpu)],
        filesystem: categories[category_slot(Category::Filesystem)],
        score: finalize(weighted),
    }
}

fn category_slot(category: Category) -> usize {
    match category {
        Category::Memory => 0,
        Category::Cpu => 1,
        Category::Filesystem => 2,
    }
}

/// Clamp to the score range and truncate toward zero
fn finalize(weighted: f64) -> i64 {
    if weighted.is_nan() {
        return MIN_SCORE;
    }
    let clamped = weighted.clamp(MIN_SCORE as f64, MAX_SCORE as f64);
    ((clamped + TRUNCATION_TOLERANCE).floor() as i64).clamp(MIN_SCORE, MAX_SCORE)
}
