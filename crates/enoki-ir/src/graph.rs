//! Control-flow graphs.
//!
//! A graph owns a dense vector of vertex slots indexed by integer label
//! (labels are stable within a pass; slots go empty after removals), a
//! forward and a backward adjacency map, and a label map. Every forward edge
//! `(u, v, k)` has a backward twin `(v, u, k)` with identical flags.

use enoki_core::ice;
use indexmap::IndexMap;

use crate::node::{Arena, Kind, NodeId};

bitflags::bitflags! {
    /// Flag set classifying a graph edge. Multiple flags may be combined on
    /// a single edge.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct EdgeKind: u32 {
        /// Plain sequencing.
        const NORMAL      = 0x01;
        /// Taken branch arm of a test.
        const YES         = 0x02;
        /// Untaken branch arm of a test.
        const NO          = 0x04;
        /// Loop-closing edge (also continue/restart targets).
        const BACK        = 0x08;
        /// Loop-body entry.
        const LOOP        = 0x10;
        /// Reverse half of an undirected interference edge.
        const SYMMETRICAL = 0x20;
    }
}

/// Directed graph over arena nodes with flagged edges.
#[derive(Debug, Default)]
pub struct Graph {
    vertices: Vec<Option<NodeId>>,
    forward: IndexMap<NodeId, IndexMap<NodeId, EdgeKind>>,
    backward: IndexMap<NodeId, IndexMap<NodeId, EdgeKind>>,
    labels: IndexMap<NodeId, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertex slots, including empty ones.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex_at(&self, label: usize) -> Option<NodeId> {
        self.vertices.get(label).copied().flatten()
    }

    pub fn label_of(&self, vertex: NodeId) -> Option<usize> {
        self.labels.get(&vertex).copied()
    }

    pub fn contains(&self, vertex: NodeId) -> bool {
        self.labels.contains_key(&vertex)
    }

    /// Assign the next label to `vertex`. No-op if already present.
    pub fn add_vertex(&mut self, vertex: NodeId) {
        if self.labels.contains_key(&vertex) {
            return;
        }
        self.labels.insert(vertex, self.vertices.len());
        self.vertices.push(Some(vertex));
    }

    /// Append an empty slot, consuming a label. Used when copying a graph
    /// that already contains empty slots, to keep label arithmetic aligned.
    pub fn add_empty_slot(&mut self) {
        self.vertices.push(None);
    }

    /// Add an edge, or union `kind` into an existing edge's flags.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        merge_edge(&mut self.forward, from, to, kind);
        merge_edge(&mut self.backward, to, from, kind);
    }

    /// Drop an edge symmetrically. Empty successor sets lose their key.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        drop_edge(&mut self.forward, from, to);
        drop_edge(&mut self.backward, to, from);
    }

    /// Empty the vertex's slot and drop its label and any remaining edges.
    /// The node itself stays in the arena.
    pub fn remove_vertex(&mut self, vertex: NodeId) {
        let Some(label) = self.labels.get(&vertex).copied() else {
            return;
        };
        for succ in self.successor_list(vertex) {
            self.remove_edge(vertex, succ);
        }
        for pred in self.predecessor_list(vertex) {
            self.remove_edge(pred, vertex);
        }
        self.vertices[label] = None;
        self.labels.shift_remove(&vertex);
    }

    pub fn successors(&self, vertex: NodeId) -> Option<&IndexMap<NodeId, EdgeKind>> {
        self.forward.get(&vertex)
    }

    pub fn predecessors(&self, vertex: NodeId) -> Option<&IndexMap<NodeId, EdgeKind>> {
        self.backward.get(&vertex)
    }

    /// Successor handles, snapshotted.
    pub fn successor_list(&self, vertex: NodeId) -> Vec<NodeId> {
        self.forward
            .get(&vertex)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Predecessor handles, snapshotted.
    pub fn predecessor_list(&self, vertex: NodeId) -> Vec<NodeId> {
        self.backward
            .get(&vertex)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// First successor with its edge kind, in insertion order.
    pub fn first_successor(&self, vertex: NodeId) -> Option<(NodeId, EdgeKind)> {
        self.forward
            .get(&vertex)
            .and_then(|m| m.iter().next())
            .map(|(v, k)| (*v, *k))
    }

    /// Successor reached over an edge carrying any flag in `kind`.
    pub fn successor_by_kind(&self, vertex: NodeId, kind: EdgeKind) -> Option<NodeId> {
        self.forward.get(&vertex).and_then(|m| {
            m.iter()
                .find(|(_, k)| k.intersects(kind))
                .map(|(v, _)| *v)
        })
    }

    /// Wire `vertex` between every predecessor of `before` and `before`
    /// itself. Predecessor edges keep their kinds; the new edge to `before`
    /// carries `NORMAL | kind`.
    pub fn inject_before(&mut self, vertex: NodeId, before: NodeId, kind: EdgeKind) {
        let preds: Vec<(NodeId, EdgeKind)> = self
            .backward
            .get(&before)
            .map(|m| m.iter().map(|(p, k)| (*p, *k)).collect())
            .unwrap_or_default();
        for (pred, pred_kind) in preds {
            self.remove_edge(pred, before);
            self.add_edge(pred, vertex, pred_kind);
        }
        self.add_edge(vertex, before, EdgeKind::NORMAL | kind);
    }

    /// Move every successor edge of `old` onto `new`, OR-ing `kind` into
    /// each edge's flags. A `None` target just drops the edges.
    pub fn replace_forward(&mut self, old: NodeId, new: Option<NodeId>, kind: EdgeKind) {
        let succs: Vec<(NodeId, EdgeKind)> = self
            .forward
            .get(&old)
            .map(|m| m.iter().map(|(s, k)| (*s, *k)).collect())
            .unwrap_or_default();
        for (succ, succ_kind) in succs {
            self.remove_edge(old, succ);
            if let Some(new) = new {
                self.add_edge(new, succ, kind | succ_kind);
            }
        }
    }

    /// Move every predecessor edge of `old` onto `new`, OR-ing `kind` into
    /// each edge's flags.
    pub fn replace_backward(&mut self, old: NodeId, new: NodeId, kind: EdgeKind) {
        let preds: Vec<(NodeId, EdgeKind)> = self
            .backward
            .get(&old)
            .map(|m| m.iter().map(|(p, k)| (*p, *k)).collect())
            .unwrap_or_default();
        for (pred, pred_kind) in preds {
            self.remove_edge(pred, old);
            self.add_edge(pred, new, kind | pred_kind);
        }
    }

    /// Splice out pass vertices and single-successor joins, OR-ing the edge
    /// kinds of the incoming and outgoing edges. Runs to fixpoint. A
    /// remaining join with other than one successor is an internal error.
    pub fn cleanup(&mut self, arena: &Arena) {
        'restart: loop {
            for label in 2..self.vertex_count() {
                let Some(vertex) = self.vertex_at(label) else {
                    continue;
                };

                if arena[vertex].is(Kind::Pass) {
                    if let Some((succ, kind)) = self.first_successor(vertex) {
                        self.replace_backward(vertex, succ, kind);
                        self.remove_edge(vertex, succ);
                        self.remove_vertex(vertex);
                        continue 'restart;
                    }
                } else if arena[vertex].is(Kind::Join) {
                    let successor_count = self.successors(vertex).map_or(0, |m| m.len());
                    if successor_count != 1 {
                        ice!("join does not have exactly 1 successor");
                    }
                    let Some((succ, kind)) = self.first_successor(vertex) else {
                        ice!("join does not have exactly 1 successor");
                    };
                    self.replace_backward(vertex, succ, kind);
                    self.remove_edge(vertex, succ);
                    self.remove_vertex(vertex);
                    continue 'restart;
                }
            }
            break;
        }
    }

    /// Forward adjacency iterator: `(from, successor map)`.
    pub fn forward_iter(&self) -> impl Iterator<Item = (NodeId, &IndexMap<NodeId, EdgeKind>)> {
        self.forward.iter().map(|(v, m)| (*v, m))
    }
}

fn merge_edge(
    adjacency: &mut IndexMap<NodeId, IndexMap<NodeId, EdgeKind>>,
    from: NodeId,
    to: NodeId,
    kind: EdgeKind,
) {
    adjacency
        .entry(from)
        .or_default()
        .entry(to)
        .and_modify(|k| *k |= kind)
        .or_insert(kind);
}

fn drop_edge(
    adjacency: &mut IndexMap<NodeId, IndexMap<NodeId, EdgeKind>>,
    from: NodeId,
    to: NodeId,
) {
    if let Some(submap) = adjacency.get_mut(&from) {
        submap.shift_remove(&to);
        if submap.is_empty() {
            adjacency.shift_remove(&from);
        }
    }
}
