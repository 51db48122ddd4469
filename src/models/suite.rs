// Suite and job identity records. Used as storage keys and equality anchors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::Storable;

/// A node the suite ran on. Only `node_id` takes part in suite identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub node_id: String,
    pub conn_url: String,
}

impl NodeRef {
    pub fn new(node_id: impl Into<String>, conn_url: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            conn_url: conn_url.into(),
        }
    }
}

/// Test suite input configuration.
///
/// `run_uuid`, `nodes` and `remote_dir` describe one particular run; they are
/// neither persisted nor compared. Identity is `test_type`, `params` and the
/// set of `nodes_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub test_type: String,
    /// Parameters for this test from the config file.
    pub params: Map<String, Value>,
    #[serde(default)]
    pub run_uuid: String,
    #[serde(default)]
    pub nodes: Vec<NodeRef>,
    pub nodes_ids: Vec<String>,
    /// Directory on nodes used for local files.
    #[serde(default)]
    pub remote_dir: String,
    pub storage_id: String,
}

impl SuiteConfig {
    pub fn new(
        test_type: impl Into<String>,
        params: Map<String, Value>,
        run_uuid: impl Into<String>,
        nodes: Vec<NodeRef>,
        remote_dir: impl Into<String>,
        idx: usize,
    ) -> Self {
        let test_type = test_type.into();
        let nodes_ids = nodes.iter().map(|n| n.node_id.clone()).collect();
        let storage_id = format!("{}_{}", test_type, idx);
        Self {
            test_type,
            params,
            run_uuid: run_uuid.into(),
            nodes,
            nodes_ids,
            remote_dir: remote_dir.into(),
            storage_id,
        }
    }

    pub fn node_set(&self) -> BTreeSet<&str> {
        self.nodes_ids.iter().map(String::as_str).collect()
    }
}

impl PartialEq for SuiteConfig {
    fn eq(&self, other: &Self) -> bool {
        self.test_type == other.test_type
            && self.params == other.params
            && self.node_set() == other.node_set()
    }
}

impl Storable for SuiteConfig {
    const IGNORED_FIELDS: &'static [&'static str] = &["nodes", "run_uuid", "remote_dir"];
}

/// One parameterized run inside a suite (e.g. one fio job section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub idx: usize,
    /// Short human-readable job description, also part of the storage id.
    pub summary: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Time range (ms) where measurements are considered stable.
    #[serde(default)]
    pub reliable_info_range: Option<(i64, i64)>,
}

impl JobConfig {
    pub fn new(idx: usize, summary: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            idx,
            summary: summary.into(),
            params,
            reliable_info_range: None,
        }
    }

    pub fn storage_id(&self) -> String {
        format!("{}_{}", self.summary, self.idx)
    }
}

impl Storable for JobConfig {
    const IGNORED_FIELDS: &'static [&'static str] = &[];
}
