//! Worklist dataflow framework.
//!
//! A dataflow run owns per-edge sets shared between the two endpoints of
//! each edge: under forward flow the outputs of `u` and the inputs of `v`
//! alias the same set for edge `(u, v)`; backward flow reverses the pairing.
//! Clients supply the set contents and the transfer function; the framework
//! supplies join insertion, the worklist, and the final verification sweep.
//!
//! Termination relies on client sets forming a lattice with monotone
//! transfer functions; the framework does not enforce this.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use enoki_core::ice;
use enoki_core::interner::Symbol;
use indexmap::IndexMap;

use crate::graph::{EdgeKind, Graph};
use crate::node::{Arena, Kind, Node, NodeId};

/// Flow direction. Forward runs start at the enter vertex (label 0),
/// backward runs at the exit vertex (label 1).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Forward,
    Backward,
}

/// A set of declarations attached to one graph edge, keyed by name.
#[derive(Debug)]
pub struct FlowSet {
    /// Kind of the edge this set sits on.
    pub kind: EdgeKind,
    pub vars: IndexMap<Symbol, NodeId>,
    /// Sentinel: the set has not been observed by a transfer function yet.
    /// Clients use this to substitute a default set on first contact.
    pub first_time: bool,
}

impl FlowSet {
    pub fn empty(kind: EdgeKind) -> Self {
        Self {
            kind,
            vars: IndexMap::new(),
            first_time: true,
        }
    }
}

/// Shared handle to an edge set. Both endpoint slot lists alias the same
/// set; a client may replace its own slot without disturbing the other side.
pub type SetRef = Rc<RefCell<FlowSet>>;

/// Per-vertex input and output slot lists, one slot per adjacent edge.
#[derive(Debug, Default)]
pub struct FlowInfo {
    pub inputs: IndexMap<NodeId, Vec<SetRef>>,
    pub outputs: IndexMap<NodeId, Vec<SetRef>>,
}

/// Client capabilities for a dataflow run.
pub trait FlowClient {
    /// Set placed on every edge before iteration begins.
    fn start_set(&mut self, arena: &Arena, kind: EdgeKind) -> FlowSet;

    /// Set substituted for a first-time input where the client needs a
    /// non-empty starting point (e.g. the universe for an intersection).
    fn default_set(&mut self, arena: &Arena, kind: EdgeKind) -> FlowSet {
        self.start_set(arena, kind)
    }

    /// Transfer function. Returns whether any output set changed.
    fn analyse(
        &mut self,
        arena: &Arena,
        graph: &Graph,
        vertex: NodeId,
        inputs: &mut Vec<SetRef>,
        outputs: &mut Vec<SetRef>,
    ) -> bool;

    /// Post-fixpoint check, called once per vertex. The run's result is the
    /// conjunction over all vertices.
    fn verify(
        &mut self,
        arena: &Arena,
        graph: &Graph,
        vertex: NodeId,
        inputs: &[SetRef],
        outputs: &[SetRef],
    ) -> bool;
}

/// Run a dataflow analysis over `graph` to fixpoint.
///
/// With `add_joins`, every vertex with more than one upstream neighbour
/// (under the direction) first gets a fresh join vertex spliced in front of
/// it, so transfer functions see all converging edges at a single point.
///
/// Returns the conjunction of the verify sweep and the per-vertex sets.
pub fn run<C: FlowClient>(
    arena: &mut Arena,
    graph: &mut Graph,
    direction: Direction,
    add_joins: bool,
    client: &mut C,
) -> (bool, FlowInfo) {
    if add_joins {
        insert_joins(arena, graph, direction);
    }

    let mut info = create_sets(arena, graph, direction, client);

    let start_label = match direction {
        Direction::Forward => 0,
        Direction::Backward => 1,
    };
    let Some(start) = graph.vertex_at(start_label) else {
        ice!("dataflow start vertex (label {start_label}) is missing");
    };

    let mut queue: VecDeque<NodeId> = VecDeque::new();
    let mut queued: HashSet<NodeId> = HashSet::new();
    queue.push_back(start);
    queued.insert(start);

    while let Some(vertex) = queue.pop_front() {
        queued.remove(&vertex);

        let FlowInfo { inputs, outputs } = &mut info;
        let Some(inputs) = inputs.get_mut(&vertex) else {
            continue;
        };
        let Some(outputs) = outputs.get_mut(&vertex) else {
            continue;
        };

        let changed = client.analyse(arena, graph, vertex, inputs, outputs);

        if changed {
            let downstream = match direction {
                Direction::Forward => graph.successor_list(vertex),
                Direction::Backward => graph.predecessor_list(vertex),
            };
            for next in downstream {
                if queued.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    let mut result = true;
    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        let inputs = info.inputs.get(&vertex).map(Vec::as_slice).unwrap_or(&[]);
        let outputs = info.outputs.get(&vertex).map(Vec::as_slice).unwrap_or(&[]);
        result &= client.verify(arena, graph, vertex, inputs, outputs);
    }

    (result, info)
}

/// Insert a join in front of every vertex with multiple upstream
/// neighbours, preserving each rerouted edge's kind. Joins themselves are
/// exempt; repeats until stable.
fn insert_joins(arena: &mut Arena, graph: &mut Graph, direction: Direction) {
    loop {
        let mut changed = false;
        let mut label = 1;
        while label < graph.vertex_count() {
            let vertex = match graph.vertex_at(label) {
                Some(v) if !arena[v].is(Kind::Join) => v,
                _ => {
                    label += 1;
                    continue;
                }
            };

            let upstream: Vec<(NodeId, EdgeKind)> = match direction {
                Direction::Forward => graph.predecessors(vertex),
                Direction::Backward => graph.successors(vertex),
            }
            .map(|m| m.iter().map(|(v, k)| (*v, *k)).collect())
            .unwrap_or_default();

            if upstream.len() > 1 {
                let join = arena.alloc(Node::new(Kind::Join, arena[vertex].line));
                graph.add_vertex(join);
                for (neighbour, kind) in upstream {
                    match direction {
                        Direction::Forward => {
                            graph.remove_edge(neighbour, vertex);
                            graph.add_edge(neighbour, join, kind);
                        }
                        Direction::Backward => {
                            graph.remove_edge(vertex, neighbour);
                            graph.add_edge(join, neighbour, kind);
                        }
                    }
                }
                match direction {
                    Direction::Forward => graph.add_edge(join, vertex, EdgeKind::NORMAL),
                    Direction::Backward => graph.add_edge(vertex, join, EdgeKind::NORMAL),
                }
                changed = true;
            }
            label += 1;
        }
        if !changed {
            break;
        }
    }
}

/// Allocate one start set per edge and alias it into the two endpoint slot
/// lists according to the direction.
fn create_sets<C: FlowClient>(
    arena: &Arena,
    graph: &Graph,
    direction: Direction,
    client: &mut C,
) -> FlowInfo {
    let mut info = FlowInfo::default();

    for label in 0..graph.vertex_count() {
        if let Some(vertex) = graph.vertex_at(label) {
            info.inputs.insert(vertex, Vec::new());
            info.outputs.insert(vertex, Vec::new());
        }
    }

    let edges: Vec<(NodeId, NodeId, EdgeKind)> = graph
        .forward_iter()
        .flat_map(|(from, succs)| succs.iter().map(move |(to, kind)| (from, *to, *kind)))
        .collect();

    for (from, to, kind) in edges {
        let set: SetRef = Rc::new(RefCell::new(client.start_set(arena, kind)));
        let (input_of, output_of) = match direction {
            Direction::Forward => (to, from),
            Direction::Backward => (from, to),
        };
        if let Some(slots) = info.inputs.get_mut(&input_of) {
            slots.push(Rc::clone(&set));
        }
        if let Some(slots) = info.outputs.get_mut(&output_of) {
            slots.push(set);
        }
    }

    info
}
