//! Wire models for the scheduler extender protocol

use crate::error::ExtenderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Object metadata fields the extender reads. Everything else is carried through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Workload being placed. Opaque to scoring beyond its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Pod {
    /// `namespace/name` for log lines
    pub fn identity(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or("<unnamed>")
        )
    }
}

/// Full node descriptor as sent by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeList {
    #[serde(default)]
    pub items: Vec<Node>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Arguments the scheduler sends to both `/filter` and `/prioritize`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtenderArgs {
    #[serde(default)]
    pub pod: Pod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeList>,
    #[serde(
        default,
        rename = "nodenames",
        alias = "nodeNames",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_names: Option<Vec<String>>,
}

impl ExtenderArgs {
    /// Resolve the candidate set to unique node identifiers, in request order.
    ///
    /// Exactly one of `nodes` / `nodenames` must be present. Descriptors
    /// without a name are skipped; a set that resolves to nothing is rejected.
    pub fn candidate_names(&self) -> Result<Vec<String>, ExtenderError> {
        let raw: Vec<&str> = match (&self.nodes, &self.node_names) {
            (Some(_), Some(_)) => return Err(ExtenderError::AmbiguousCandidates),
            (None, None) => return Err(ExtenderError::NoCandidates),
            (Some(list), None) => list
                .items
                .iter()
                .filter_map(|node| node.metadata.name.as_deref())
                .collect(),
            (None, Some(names)) => names.iter().map(String::as_str).collect(),
        };

        let mut seen = HashSet::new();
        let names: Vec<String> = raw
            .into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty() && seen.insert(*name))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(ExtenderError::NoCandidates);
        }
        Ok(names)
    }
}

/// Result of the admission (filter) call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtenderFilterResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<NodeList>,
    #[serde(
        default,
        rename = "nodenames",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_names: Option<Vec<String>>,
    #[serde(rename = "failedNodes", default)]
    pub failed_nodes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Score assigned to one candidate node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPriority {
    pub host: String,
    pub score: i64,
}

/// Result of the prioritize call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostPriorityList {
    #[serde(rename = "hostPriorityList")]
    pub host_priority_list: Vec<HostPriority>,
}

/// Error body returned for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
