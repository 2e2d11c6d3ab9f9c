//! Graph linearisation.
//!
//! Emits vertices in a fall-through-friendly order: straight-line chains
//! run inline without jumps, a test emits its conditional jump to the
//! branch arm and falls through into the other arm, and a label appears
//! only where a vertex can be reached by something other than the
//! previously emitted vertex.

use std::collections::{HashSet, VecDeque};

use enoki_core::ice;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Kind, NodeId};

use crate::ast::Cx;

/// Capability bundle the linearizer drives. Implemented by the assembly
/// backend; labels are graph labels, already unique per function.
pub trait EmitBackend {
    fn comment(&mut self, out: &mut String, vertex: NodeId);
    fn enter(&mut self, out: &mut String, vertex: NodeId);
    fn exit(&mut self, out: &mut String, vertex: NodeId);
    fn end(&mut self, out: &mut String);
    fn label(&mut self, out: &mut String, label: usize);
    fn jump(&mut self, out: &mut String, label: usize);
    fn ret(&mut self, out: &mut String, vertex: NodeId);
    fn assign(&mut self, out: &mut String, vertex: NodeId);
    fn test(&mut self, out: &mut String, vertex: NodeId, branch_kind: EdgeKind, label: usize);
}

/// Walk one function's graph from its enter vertex, driving the backend.
pub fn emit_function(
    cx: &Cx,
    graph: &Graph,
    backend: &mut impl EmitBackend,
    out: &mut String,
) {
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    let mut done: HashSet<NodeId> = HashSet::new();

    let Some(enter) = graph.vertex_at(0) else {
        ice!("emitting a graph with no enter vertex");
    };
    queue.push_back(enter);

    let mut last: Option<NodeId> = None;
    'queue: while let Some(next) = queue.pop_front() {
        if done.contains(&next) {
            continue;
        }

        let mut vertex = next;
        loop {
            done.insert(vertex);
            let label = graph
                .label_of(vertex)
                .unwrap_or_else(|| ice!("emitting a vertex outside the graph"));

            let needs_label = graph.predecessors(vertex).is_some_and(|preds| {
                preds.len() > 1
                    || (preds.len() == 1 && last != preds.keys().next().copied())
            });
            if needs_label {
                backend.label(out, label);
            }
            backend.comment(out, vertex);

            match cx.arena[vertex].kind() {
                Kind::Enter => backend.enter(out, vertex),
                Kind::Exit => {
                    backend.exit(out, vertex);
                    last = Some(vertex);
                    continue 'queue;
                }
                Kind::Assign => backend.assign(out, vertex),
                Kind::Return => backend.ret(out, vertex),
                Kind::Test => {
                    // First successor falls through, second is the jump
                    // target; the jump condition is negated for a NO arm.
                    let Some(succs) = graph.successors(vertex) else {
                        ice!("test vertex with no successors");
                    };
                    let mut iter = succs.iter();
                    let Some((&fallthrough, _)) = iter.next() else {
                        ice!("test vertex with no successors");
                    };
                    let Some((&branch, &branch_kind)) = iter.next() else {
                        ice!("test vertex with a single successor");
                    };
                    let branch_label = graph
                        .label_of(branch)
                        .unwrap_or_else(|| ice!("branch target outside the graph"));

                    backend.test(out, vertex, branch_kind, branch_label);
                    if !done.contains(&branch) {
                        queue.push_back(branch);
                    }

                    // Fall through inline. `last` stays stale so the arm
                    // still gets its label: the test also reaches it by
                    // jumping in the other direction's encoding.
                    if !done.contains(&fallthrough) {
                        vertex = fallthrough;
                        continue;
                    }
                    let fallthrough_label = graph
                        .label_of(fallthrough)
                        .unwrap_or_else(|| ice!("fallthrough target outside the graph"));
                    backend.jump(out, fallthrough_label);
                    continue 'queue;
                }
                other => ice!("don't know how to emit {} vertex", other.name()),
            }

            last = Some(vertex);
            let Some((successor, _)) = graph.first_successor(vertex) else {
                continue 'queue;
            };
            if done.contains(&successor) {
                let successor_label = graph
                    .label_of(successor)
                    .unwrap_or_else(|| ice!("jump target outside the graph"));
                backend.jump(out, successor_label);
                continue 'queue;
            }
            vertex = successor;
        }
    }

    backend.end(out);
}
