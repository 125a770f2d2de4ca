use std::io;

use copy_check_core::{Dendrogram, LoadStats, Node, PairResult};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonLoadStats {
    pub(crate) entries: u64,
    pub(crate) submissions: u64,
    pub(crate) files: u64,
    pub(crate) bytes: u64,
    pub(crate) skipped_hidden: u64,
    pub(crate) skipped_binary: u64,
    pub(crate) skipped_too_large: u64,
    pub(crate) skipped_empty: u64,
    pub(crate) skipped_duplicate: u64,
    pub(crate) skipped_walk_errors: u64,
}

impl From<LoadStats> for JsonLoadStats {
    fn from(stats: LoadStats) -> Self {
        Self {
            entries: stats.entries,
            submissions: stats.submissions,
            files: stats.files,
            bytes: stats.bytes,
            skipped_hidden: stats.skipped_hidden,
            skipped_binary: stats.skipped_binary,
            skipped_too_large: stats.skipped_too_large,
            skipped_empty: stats.skipped_empty,
            skipped_duplicate: stats.skipped_duplicate,
            skipped_walk_errors: stats.skipped_walk_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonPair {
    pub(crate) a: String,
    pub(crate) b: String,
    /// `None` for pairs whose score could not be computed.
    pub(crate) distance: Option<f32>,
    pub(crate) suspicious: bool,
}

/// Dendrogram nodes in creation order; leaves first, the root last.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonTreeNode {
    pub(crate) id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) submission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) children: Option<[usize; 2]>,
    pub(crate) distance: f32,
    pub(crate) size: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonReport {
    pub(crate) key: String,
    pub(crate) submissions: Vec<String>,
    pub(crate) alpha: f64,
    pub(crate) threshold: Option<f64>,
    pub(crate) total_pairs: usize,
    pub(crate) pairs: Vec<JsonPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tree: Option<Vec<JsonTreeNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) load_stats: Option<JsonLoadStats>,
}

pub(crate) fn map_pairs(
    ids: &[String],
    pairs: &[PairResult],
    threshold: Option<f64>,
    limit: usize,
) -> Vec<JsonPair> {
    pairs
        .iter()
        .take(limit)
        .map(|p| JsonPair {
            a: ids[p.a].clone(),
            b: ids[p.b].clone(),
            distance: (!p.is_failed()).then_some(p.distance),
            suspicious: is_suspicious(p, threshold),
        })
        .collect()
}

pub(crate) fn is_suspicious(pair: &PairResult, threshold: Option<f64>) -> bool {
    !pair.is_failed() && threshold.is_some_and(|t| f64::from(pair.distance) < t)
}

pub(crate) fn map_tree(tree: &Dendrogram) -> Vec<JsonTreeNode> {
    tree.nodes()
        .iter()
        .enumerate()
        .map(|(id, node)| JsonTreeNode {
            id,
            submission: match node {
                Node::Leaf { submission } => Some(tree.label(*submission).to_string()),
                Node::Merge { .. } => None,
            },
            children: node
                .children()
                .map(|(left, right)| [left.index(), right.index()]),
            distance: node.distance(),
            size: node.size(),
        })
        .collect()
}

pub(crate) fn write_json<T: Serialize>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::other(format!("json encode: {e}")))?;
    println!("{json}");
    Ok(())
}
