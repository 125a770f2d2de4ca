//! Agglomerative clustering of a finished distance matrix.

mod linkage;

pub use linkage::Linkage;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::DistanceMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf {
        submission: usize,
    },
    Merge {
        left: NodeId,
        right: NodeId,
        distance: f32,
        size: usize,
    },
}

impl Node {
    /// Merge distance; leaves sit at 0.
    pub fn distance(&self) -> f32 {
        match self {
            Node::Leaf { .. } => 0.0,
            Node::Merge { distance, .. } => *distance,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Merge { size, .. } => *size,
        }
    }

    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self {
            Node::Leaf { .. } => None,
            Node::Merge { left, right, .. } => Some((*left, *right)),
        }
    }
}

/// A binary merge tree over submissions. Leaves are nodes `0..n`, in
/// submission order; merges follow in creation order.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    nodes: Vec<Node>,
    labels: Vec<String>,
    linkage: Linkage,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    // Lexical ranks of both nodes' first leaves, low then high.
    key: (usize, usize),
    a: NodeId,
    b: NodeId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the closest pair first.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.key.cmp(&self.key))
    }
}

struct Builder<'a> {
    matrix: &'a DistanceMatrix,
    linkage: Linkage,
    nodes: Vec<Node>,
    leaves: Vec<Vec<usize>>,
    rank: Vec<usize>,
    active: Vec<bool>,
    heap: BinaryHeap<Candidate>,
}

impl Builder<'_> {
    fn candidate(&self, a: NodeId, b: NodeId) -> Candidate {
        let distance = self
            .linkage
            .distance(&self.leaves[a.0], &self.leaves[b.0], self.matrix);
        let (ra, rb) = (self.rank[a.0], self.rank[b.0]);
        Candidate {
            distance,
            key: (ra.min(rb), ra.max(rb)),
            a,
            b,
        }
    }

    fn merge(&mut self, c: Candidate) -> NodeId {
        let (left, right) = if self.rank[c.a.0] <= self.rank[c.b.0] {
            (c.a, c.b)
        } else {
            (c.b, c.a)
        };
        let distance = c
            .distance
            .max(self.nodes[left.0].distance())
            .max(self.nodes[right.0].distance());
        let size = self.nodes[left.0].size() + self.nodes[right.0].size();

        let mut leaves = std::mem::take(&mut self.leaves[left.0]);
        leaves.extend(std::mem::take(&mut self.leaves[right.0]));
        let rank = self.rank[left.0].min(self.rank[right.0]);

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Merge {
            left,
            right,
            distance,
            size,
        });
        self.leaves.push(leaves);
        self.rank.push(rank);
        self.active[left.0] = false;
        self.active[right.0] = false;
        self.active.push(true);
        id
    }
}

impl Dendrogram {
    /// Clusters `matrix`; `labels[i]` names submission `i` and orders ties.
    pub fn build(matrix: &DistanceMatrix, labels: Vec<String>, linkage: Linkage) -> Result<Self> {
        let n = matrix.len();
        if labels.len() != n {
            return Err(Error::LabelCount {
                expected: n,
                got: labels.len(),
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| labels[a].cmp(&labels[b]).then(a.cmp(&b)));
        let mut rank = vec![0usize; n];
        for (r, &i) in order.iter().enumerate() {
            rank[i] = r;
        }

        let mut builder = Builder {
            matrix,
            linkage,
            nodes: (0..n).map(|submission| Node::Leaf { submission }).collect(),
            leaves: (0..n).map(|i| vec![i]).collect(),
            rank,
            active: vec![true; n],
            heap: BinaryHeap::with_capacity(n * n.saturating_sub(1) / 2),
        };

        for i in 0..n {
            for j in 0..i {
                let c = builder.candidate(NodeId(j), NodeId(i));
                builder.heap.push(c);
            }
        }

        let mut remaining = n;
        while remaining > 1 {
            let Some(c) = builder.heap.pop() else {
                break;
            };
            if !builder.active[c.a.0] || !builder.active[c.b.0] {
                continue;
            }
            let merged = builder.merge(c);
            remaining -= 1;

            let others: Vec<NodeId> = (0..merged.0)
                .filter(|&id| builder.active[id])
                .map(NodeId)
                .collect();
            for other in others {
                let c = builder.candidate(other, merged);
                builder.heap.push(c);
            }
        }
        debug!(leaves = n, nodes = builder.nodes.len(), %linkage, "dendrogram built");

        Ok(Self {
            nodes: builder.nodes,
            labels,
            linkage,
        })
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn leaf_count(&self) -> usize {
        self.labels.len()
    }

    pub fn internal_count(&self) -> usize {
        self.nodes.len() - self.labels.len()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(1).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Every node, leaves first, indexed by [`NodeId::index`].
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn label(&self, submission: usize) -> &str {
        &self.labels[submission]
    }

    /// Submission indices under `id`, left subtree first.
    pub fn leaves(&self, id: NodeId) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes[id.0].size());
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            match &self.nodes[next.0] {
                Node::Leaf { submission } => out.push(*submission),
                Node::Merge { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }
        out
    }

    /// All submissions in tree order.
    pub fn leaf_order(&self) -> Vec<usize> {
        self.root().map(|r| self.leaves(r)).unwrap_or_default()
    }

    /// Cuts the tree at `threshold`: the largest subtrees merged at or below
    /// it. Every leaf lands in exactly one returned subtree, so a threshold
    /// at or above the root distance yields `[root]` rather than nothing.
    pub fn clusters_at_level(&self, threshold: f32) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(root) = self.root() else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match self.nodes[id.0] {
                Node::Merge {
                    left,
                    right,
                    distance,
                    ..
                } if distance > threshold => {
                    stack.push(right);
                    stack.push(left);
                }
                _ => out.push(id),
            }
        }
        out
    }

    /// Indented text rendering, one node per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let Some(root) = self.root() else {
            return out;
        };
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            for _ in 0..depth {
                out.push_str("  ");
            }
            match &self.nodes[id.0] {
                Node::Leaf { submission } => {
                    out.push_str(&self.labels[*submission]);
                }
                Node::Merge {
                    left,
                    right,
                    distance,
                    size,
                } => {
                    out.push_str(&format!("{distance:.4} ({size})"));
                    stack.push((*right, depth + 1));
                    stack.push((*left, depth + 1));
                }
            }
            out.push('\n');
        }
        out
    }
}
