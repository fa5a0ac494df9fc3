//! Tunable weights and cutoffs for node scoring

use crate::dimension::{Category, MetricDimension};
use crate::error::PolicyError;
use serde::{Deserialize, Serialize};

/// Ratio cutoffs for [`super::normalize`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cutoffs {
    /// At or below this multiple of the fleet average a node shows no pressure
    pub min_ratio: f64,
    /// At or above this multiple of the fleet average a node is saturated
    pub max_ratio: f64,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self {
            min_ratio: 0.5,
            max_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub memory: f64,
    pub cpu: f64,
    pub filesystem: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            memory: 0.4,
            cpu: 0.4,
            filesystem: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryWeights {
    pub allocated_bytes: f64,
    pub page_faults: f64,
}

impl Default for MemoryWeights {
    fn default() -> Self {
        Self {
            allocated_bytes: 0.6,
            page_faults: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuWeights {
    pub graceful_switches: f64,
    pub forced_switches: f64,
}

impl Default for CpuWeights {
    fn default() -> Self {
        Self {
            graceful_switches: 0.2,
            forced_switches: 0.8,
        }
    }
}

/// Filesystem weights: `read`/`write` split the category, `count`/`volume`
/// split each of read and write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemWeights {
    pub read: f64,
    pub write: f64,
    pub count: f64,
    pub volume: f64,
}

impl Default for FilesystemWeights {
    fn default() -> Self {
        Self {
            read: 0.3,
            write: 0.7,
            count: 0.4,
            volume: 0.6,
        }
    }
}

/// Complete scoring policy threaded into every scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub cutoffs: Cutoffs,
    /// Sub-score used when a dimension has no usable data
    pub neutral_score: f64,
    pub categories: CategoryWeights,
    pub memory: MemoryWeights,
    pub cpu: CpuWeights,
    pub filesystem: FilesystemWeights,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            cutoffs: Cutoffs::default(),
            neutral_score: 50.0,
            categories: CategoryWeights::default(),
            memory: MemoryWeights::default(),
            cpu: CpuWeights::default(),
            filesystem: FilesystemWeights::default(),
        }
    }
}

impl ScoringPolicy {
    /// Weight of a category in the final score
    pub fn category_weight(&self, category: Category) -> f64 {
        match category {
            Category::Memory => self.categories.memory,
            Category::Cpu => self.categories.cpu,
            Category::Filesystem => self.categories.filesystem,
        }
    }

    /// Weight of a dimension inside its category
    pub fn weight_within_category(&self, dimension: MetricDimension) -> f64 {
        let fs = &self.filesystem;
        match dimension {
            MetricDimension::AllocatedMemoryBytes => self.memory.allocated_bytes,
            MetricDimension::PageFaults => self.memory.page_faults,
            MetricDimension::GracefulContextSwitches => self.cpu.graceful_switches,
            MetricDimension::ForcedContextSwitches => self.cpu.forced_switches,
            MetricDimension::FsReadCount => fs.read * fs.count,
            MetricDimension::FsReadVolume => fs.read * fs.volume,
            MetricDimension::FsWriteCount => fs.write * fs.count,
            MetricDimension::FsWriteVolume => fs.write * fs.volume,
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let Cutoffs {
            min_ratio,
            max_ratio,
        } = self.cutoffs;
        if !(min_ratio.is_finite() && max_ratio.is_finite() && min_ratio >= 0.0)
            || min_ratio >= max_ratio
        {
            return Err(PolicyError::Cutoffs {
                min: min_ratio,
                max: max_ratio,
            });
        }

        if !(0.0..=100.0).contains(&self.neutral_score) {
            return Err(PolicyError::NeutralScore(self.neutral_score));
        }

        let weights = [
            ("categories.memory", self.categories.memory),
            ("categories.cpu", self.categories.cpu),
            ("categories.filesystem", self.categories.filesystem),
            ("memory.allocated_bytes", self.memory.allocated_bytes),
            ("memory.page_faults", self.memory.page_faults),
            ("cpu.graceful_switches", self.cpu.graceful_switches),
            ("cpu.forced_switches", self.cpu.forced_switches),
            ("filesystem.read", self.filesystem.read),
            ("filesystem.write", self.filesystem.write),
            ("filesystem.count", self.filesystem.count),
            ("filesystem.volume", self.filesystem.volume),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PolicyError::Weight(name));
            }
        }

        Ok(())
    }
}
