//! Structural graph cleanups: dead-code removal and constant-test folding.

use enoki_core::ice;
use enoki_ir::graph::EdgeKind;
use enoki_ir::node::{Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

/// Remove every vertex with no predecessor, except the enter vertex.
pub fn remove_dead_code(cx: &mut Cx, func: NodeId) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut changed = false;
    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        if cx.arena[vertex].is(Kind::Enter) {
            continue;
        }
        let has_predecessor = graph.predecessors(vertex).is_some_and(|m| !m.is_empty());
        if has_predecessor {
            continue;
        }

        graph.replace_forward(vertex, None, EdgeKind::empty());
        graph.remove_vertex(vertex);
        changed = true;
    }

    restore_graph!(cx, func, graph);
    changed
}

/// Turn every test of an integer literal into an unconditional branch: the
/// predecessors rewire to the YES successor when the literal is nonzero,
/// else to the NO successor. The test vertex goes unreachable and the next
/// dead-code sweep collects it.
pub fn optimise_constant_tests(cx: &mut Cx, func: NodeId) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut changed = false;
    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        if !cx.arena[vertex].is(Kind::Test) {
            continue;
        }
        let expr = cx.arena.child_req(vertex, 0);
        if !cx.arena[expr].is(Kind::Integer) {
            continue;
        }

        let target_kind = if cx.arena[expr].int_value() != 0 {
            EdgeKind::YES
        } else {
            EdgeKind::NO
        };
        let Some(target) = graph.successor_by_kind(vertex, target_kind) else {
            ice!("test vertex is missing its branch successor");
        };

        graph.replace_backward(vertex, target, EdgeKind::empty());
        changed = true;
    }

    restore_graph!(cx, func, graph);
    changed
}

/// Run constant-test folding and dead-code removal to fixpoint.
pub fn optimise(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let mut changed = false;
    loop {
        let folded = optimise_constant_tests(cx, func);
        let removed = remove_dead_code(cx, func);
        if !folded && !removed {
            break;
        }
        changed = true;
    }
    changed
}
