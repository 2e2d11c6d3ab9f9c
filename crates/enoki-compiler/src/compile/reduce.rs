//! Expression reduction: three-address atomic form.
//!
//! After this pass every vertex expression is either atomic (integer,
//! string, variable, closure, tuple of atomics) or a single operator or
//! call whose operands are atomic, and the short-circuit operators are
//! gone. Non-atomic operands move into fresh temporaries assigned on new
//! vertices injected before the current one; `&&`/`||` become extra test
//! vertices wired so the right operand only evaluates when the left one
//! does not already decide the outcome.
//!
//! The graph grows while the pass runs, so it sweeps to fixpoint.

use enoki_core::ice;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Arena, Kind, NodeId};
use enoki_ir::ops;

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

pub fn reduce(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };
    reduce_graph(cx, func, &mut graph);
    restore_graph!(cx, func, graph);
    true
}

pub(crate) fn is_atomic(arena: &Arena, expr: NodeId) -> bool {
    match arena[expr].kind() {
        Kind::Integer | Kind::Str | Kind::Variable | Kind::Closure => true,
        Kind::Tuple => (0..arena.num_children(expr)).all(|i| {
            arena
                .child(expr, i)
                .is_some_and(|child| is_atomic(arena, child))
        }),
        _ => false,
    }
}

fn is_simple(arena: &Arena, expr: NodeId) -> bool {
    if is_atomic(arena, expr) {
        return true;
    }
    let kind = arena[expr].kind();
    if ops::is_binary_op(kind) {
        return is_atomic(arena, arena.child_req(expr, 0))
            && is_atomic(arena, arena.child_req(expr, 1));
    }
    match kind {
        Kind::Call => is_atomic(arena, arena.child_req(expr, 1)),
        Kind::Tuple => (0..arena.num_children(expr)).all(|i| {
            arena
                .child(expr, i)
                .is_some_and(|child| is_simple(arena, child))
        }),
        _ => false,
    }
}

fn temp_type(cx: &Cx, expr: NodeId) -> NodeId {
    match cx.arena[expr].ty {
        Some(ty) => ty,
        None => ice!("temporary for an untyped expression"),
    }
}

/// Move a non-simple expression's work onto vertices injected before
/// `before`, returning the expression that replaces it in place.
fn simplify_expression(
    cx: &mut Cx,
    func: NodeId,
    graph: &mut Graph,
    expr: NodeId,
    before: NodeId,
) -> NodeId {
    let line = cx.arena[expr].line;
    let kind = cx.arena[expr].kind();

    if kind == Kind::And || kind == Kind::Or {
        let sub0 = cx.arena.child_req(expr, 0);
        let sub1 = cx.arena.child_req(expr, 1);

        let new_test = cx.make_test(sub0, line);

        // For AND the right operand runs on the YES arm and the NO arm
        // bypasses; OR is the mirror image.
        let (inner_start, outer) = if kind == Kind::Or {
            (EdgeKind::NO, EdgeKind::YES)
        } else {
            (EdgeKind::YES, EdgeKind::NO)
        };

        graph.add_vertex(new_test);
        let mut inner = inner_start;
        let succs: Vec<(NodeId, EdgeKind)> = graph
            .successors(before)
            .map(|m| m.iter().map(|(v, k)| (*v, *k)).collect())
            .unwrap_or_default();
        for (succ, succ_kind) in succs {
            if succ_kind.intersects(outer) {
                graph.add_edge(new_test, succ, succ_kind);
            }
            if succ_kind.intersects(inner) {
                inner = succ_kind;
            }
        }
        graph.inject_before(new_test, before, inner);

        return sub1;
    }

    if is_simple(&cx.arena, expr) {
        return expr;
    }

    if kind == Kind::Call {
        let args = cx.arena.child_req(expr, 1);
        let atomised = atomise_expression(cx, func, graph, args, before);
        cx.arena.set_child(expr, 1, Some(atomised));
        return expr;
    }

    for i in 0..cx.arena.num_children(expr) {
        let Some(child) = cx.arena.child(expr, i) else {
            continue;
        };
        if !is_atomic(&cx.arena, child) {
            let ty = temp_type(cx, child);
            let child_line = cx.arena[child].line;
            let temp = cx.new_temp(func, ty, child_line);
            let assign = cx.make_assignment(Some(temp), child, child_line);
            graph.add_vertex(assign);
            graph.inject_before(assign, before, EdgeKind::empty());
            let temp_use = cx.arena.copy(temp);
            cx.arena.set_child(expr, i, Some(temp_use));
        }
    }

    expr
}

/// Reduce an expression all the way to an atom, spilling any computation
/// into a temporary assigned before `before`.
fn atomise_expression(
    cx: &mut Cx,
    func: NodeId,
    graph: &mut Graph,
    expr: NodeId,
    before: NodeId,
) -> NodeId {
    if is_atomic(&cx.arena, expr) {
        return expr;
    }

    let line = cx.arena[expr].line;
    if cx.arena[expr].is(Kind::Tuple) {
        let new_tuple = cx.make_empty_tuple(line);
        for i in 0..cx.arena.num_children(expr) {
            let Some(child) = cx.arena.child(expr, i) else {
                continue;
            };
            let atom = atomise_expression(cx, func, graph, child, before);
            cx.arena.add_child(new_tuple, Some(atom));
        }
        return new_tuple;
    }

    let ty = temp_type(cx, expr);
    let temp = cx.new_temp(func, ty, line);
    let assign = cx.make_assignment(Some(temp), expr, line);
    graph.add_vertex(assign);
    graph.inject_before(assign, before, EdgeKind::empty());
    cx.arena.copy(temp)
}

fn reduce_graph(cx: &mut Cx, func: NodeId, graph: &mut Graph) {
    loop {
        let num = graph.vertex_count();
        for label in 0..num {
            let Some(vertex) = graph.vertex_at(label) else {
                continue;
            };
            match cx.arena[vertex].kind() {
                Kind::Assign => {
                    let expr = cx.arena.child_req(vertex, 1);
                    let new = simplify_expression(cx, func, graph, expr, vertex);
                    cx.arena.set_child(vertex, 1, Some(new));
                }
                Kind::Test => {
                    let expr = cx.arena.child_req(vertex, 0);
                    let new = simplify_expression(cx, func, graph, expr, vertex);
                    cx.arena.set_child(vertex, 0, Some(new));
                }
                Kind::Return => {
                    let expr = cx.arena.child_req(vertex, 0);
                    let new = atomise_expression(cx, func, graph, expr, vertex);
                    cx.arena.set_child(vertex, 0, Some(new));
                }
                _ => {}
            }
        }
        if num == graph.vertex_count() {
            break;
        }
    }
}
