//! The closed set of metric dimensions the extender scores on

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoring category a dimension contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Memory,
    Cpu,
    Filesystem,
}

impl Category {
    pub const COUNT: usize = 3;

    pub const ALL: [Category; Self::COUNT] =
        [Category::Memory, Category::Cpu, Category::Filesystem];
}

/// One measured quantity exported by the node profilers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricDimension {
    AllocatedMemoryBytes,
    PageFaults,
    GracefulContextSwitches,
    ForcedContextSwitches,
    FsReadCount,
    FsReadVolume,
    FsWriteCount,
    FsWriteVolume,
}

impl MetricDimension {
    pub const COUNT: usize = 8;

    pub const ALL: [MetricDimension; Self::COUNT] = [
        MetricDimension::AllocatedMemoryBytes,
        MetricDimension::PageFaults,
        MetricDimension::GracefulContextSwitches,
        MetricDimension::ForcedContextSwitches,
        MetricDimension::FsReadCount,
        MetricDimension::FsReadVolume,
        MetricDimension::FsWriteCount,
        MetricDimension::FsWriteVolume,
    ];

    /// Slot in per-dimension arrays
    pub const fn index(self) -> usize {
        match self {
            MetricDimension::AllocatedMemoryBytes => 0,
            MetricDimension::PageFaults => 1,
            MetricDimension::GracefulContextSwitches => 2,
            MetricDimension::ForcedContextSwitches => 3,
            MetricDimension::FsReadCount => 4,
            MetricDimension::FsReadVolume => 5,
            MetricDimension::FsWriteCount => 6,
            MetricDimension::FsWriteVolume => 7,
        }
    }

    /// Metric name as exported to the monitoring backend
    pub const fn metric_name(self) -> &'static str {
        match self {
            MetricDimension::AllocatedMemoryBytes => "mem_bytes_allocated",
            MetricDimension::PageFaults => "page_faults",
            MetricDimension::GracefulContextSwitches => "ctx_switches_graceful",
            MetricDimension::ForcedContextSwitches => "ctx_switches_forced",
            MetricDimension::FsReadCount => "fs_read_count",
            MetricDimension::FsReadVolume => "fs_read_size_kb",
            MetricDimension::FsWriteCount => "fs_write_count",
            MetricDimension::FsWriteVolume => "fs_write_size_kb",
        }
    }

    pub const fn category(self) -> Category {
        match self {
            MetricDimension::AllocatedMemoryBytes | MetricDimension::PageFaults => {
                Category::Memory
            }
            MetricDimension::GracefulContextSwitches | MetricDimension::ForcedContextSwitches => {
                Category::Cpu
            }
            MetricDimension::FsReadCount
            | MetricDimension::FsReadVolume
            | MetricDimension::FsWriteCount
            | MetricDimension::FsWriteVolume => Category::Filesystem,
        }
    }

    /// PromQL instant query selecting this metric for every listed node.
    ///
    /// Node names are matched as an anchored regex alternation, so they are
    /// regex-escaped and then escaped again for the PromQL string literal.
    pub fn query(self, node_label: &str, nodes: &[String]) -> String {
        let alternation = nodes
            .iter()
            .map(|node| escape_regex_literal(node))
            .collect::<Vec<_>>()
            .join("|");
        format!(
            "{}{{{}=~\"{}\"}}",
            self.metric_name(),
            node_label,
            alternation
        )
    }
}

/// Escape a node name for use inside the double-quoted regex matcher.
///
/// RE2 metacharacters get a regex backslash, and every backslash and
/// double quote is then escaped again for the PromQL string literal.
fn escape_regex_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str(r"\\\\"),
            '"' => escaped.push_str(r#"\""#),
            '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                escaped.push_str(r"\\");
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for MetricDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense_and_unique() {
        for (position, dimension) in MetricDimension::ALL.iter().enumerate() {
            assert_eq!(dimension.index(), position);
        }
    }

    #[test]
    fn test_every_category_has_dimensions() {
        for category in Category::ALL {
            assert!(MetricDimension::ALL
                .iter()
                .any(|d| d.category() == category));
        }
    }

    #[test]
    fn test_query_uses_node_disjunction() {
        let nodes = vec!["worker-1".to_string(), "worker-2".to_string()];
        assert_eq!(
            MetricDimension::PageFaults.query("node_id", &nodes),
            r#"page_faults{node_id=~"worker-1|worker-2"}"#
        );
    }

    #[test]
    fn test_query_escapes_regex_metacharacters() {
        let nodes = vec!["ip-10-0-0-1.ec2.internal".to_string()];
        assert_eq!(
            MetricDimension::FsWriteVolume.query("node_id", &nodes),
            r#"fs_write_size_kb{node_id=~"ip-10-0-0-1\\.ec2\\.internal"}"#
        );
    }

    #[test]
    fn test_query_escapes_quotes_and_backslashes() {
        let nodes = vec![r#"odd"node\x"#.to_string()];
        assert_eq!(
            MetricDimension::PageFaults.query("node_id", &nodes),
            r#"page_faults{node_id=~"odd\"node\\\\x"}"#
        );
    }
}
