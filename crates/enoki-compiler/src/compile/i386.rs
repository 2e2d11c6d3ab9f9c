//! i386 normalisation: destructive two-operand form.
//!
//! Destination-overwrite instructions require the destination to equal the
//! first operand. Unary and binary assignments that break the rule get a
//! move of the first operand into the destination prepended; a
//! non-commutable operation whose second operand is the destination first
//! saves that value in a temporary. Tuple-destination assignments (parallel
//! moves) expand into a chain of scalar assignments.

use enoki_core::ice;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Kind, NodeId};
use enoki_ir::ops;

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

pub fn i386ify(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut changed = false;
    let mut label = 0;
    while label < graph.vertex_count() {
        if let Some(vertex) = graph.vertex_at(label) {
            if cx.arena[vertex].is(Kind::Assign) {
                changed |= i386ify_assignment(cx, func, &mut graph, vertex);
            }
        }
        label += 1;
    }

    restore_graph!(cx, func, graph);
    changed
}

fn is_same_var(cx: &Cx, a: Option<NodeId>, b: Option<NodeId>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if !cx.arena[a].is(Kind::Variable) || !cx.arena[b].is(Kind::Variable) {
        return false;
    }
    cx.arena[a].var().name == cx.arena[b].var().name
}

/// Prepend `d = <expr child>` in front of `vertex` and use `d` as that
/// child instead.
fn hoist_into_destination(
    cx: &mut Cx,
    graph: &mut Graph,
    vertex: NodeId,
    expr: NodeId,
    child_index: usize,
    dest: NodeId,
) {
    let line = cx.arena[vertex].line;
    let operand = cx.arena.child_req(expr, child_index);
    let dest_copy = cx.arena.copy(dest);
    let new_assign = cx.make_assignment(Some(dest_copy), operand, line);
    let dest_use = cx.arena.copy(dest);
    cx.arena.set_child(expr, child_index, Some(dest_use));
    graph.add_vertex(new_assign);
    graph.replace_backward(vertex, new_assign, EdgeKind::empty());
    graph.add_edge(new_assign, vertex, EdgeKind::empty());
}

/// `a = #b` becomes `a = b; a = #a`. (`a = #a` is already in form.)
fn i386ify_unary_operation(cx: &mut Cx, graph: &mut Graph, vertex: NodeId) -> bool {
    let Some(dest) = cx.arena.child(vertex, 0) else {
        return false;
    };
    let expr = cx.arena.child_req(vertex, 1);
    let arg0 = cx.arena.child(expr, 0);

    if is_same_var(cx, Some(dest), arg0) {
        return false;
    }

    hoist_into_destination(cx, graph, vertex, expr, 0, dest);
    true
}

/// Binary assignments. `a = b # a` swaps when `#` commutes and otherwise
/// saves `a` in a temporary first; after that, anything with `dest != first
/// operand` becomes `a = b; a = a # c`.
fn i386ify_binary_operation(cx: &mut Cx, func: NodeId, graph: &mut Graph, vertex: NodeId) -> bool {
    let Some(dest) = cx.arena.child(vertex, 0) else {
        return false;
    };
    let expr = cx.arena.child_req(vertex, 1);
    let arg0 = cx.arena.child(expr, 0);
    let arg1 = cx.arena.child(expr, 1);

    if !is_same_var(cx, Some(dest), arg0) && is_same_var(cx, Some(dest), arg1) {
        if ops::is_commutable_op(cx.arena[expr].kind()) {
            cx.arena.set_child(expr, 0, arg1);
            cx.arena.set_child(expr, 1, arg0);
        } else {
            let line = cx.arena[vertex].line;
            let operand = cx.arena.child_req(expr, 1);
            let ty = match cx.arena[operand].ty {
                Some(ty) => ty,
                None => ice!("temporary for an untyped operand"),
            };
            let temp = cx.new_temp(func, ty, line);
            let new_assign = cx.make_assignment(Some(temp), operand, line);
            let temp_use = cx.arena.copy(temp);
            cx.arena.set_child(expr, 1, Some(temp_use));
            graph.add_vertex(new_assign);
            graph.replace_backward(vertex, new_assign, EdgeKind::empty());
            graph.add_edge(new_assign, vertex, EdgeKind::empty());
        }
    }

    let arg0 = cx.arena.child(expr, 0);
    if is_same_var(cx, Some(dest), arg0) {
        return false;
    }

    hoist_into_destination(cx, graph, vertex, expr, 0, dest);
    true
}

fn i386ify_assignment(cx: &mut Cx, func: NodeId, graph: &mut Graph, vertex: NodeId) -> bool {
    let mut changed = false;
    let expr = cx.arena.child_req(vertex, 1);

    if ops::is_unary_op(cx.arena[expr].kind()) {
        changed |= i386ify_unary_operation(cx, graph, vertex);
    }
    if ops::is_binary_op(cx.arena[expr].kind()) {
        changed |= i386ify_binary_operation(cx, func, graph, vertex);
    }

    // Expand tuple assignments into a chain of scalar moves.
    let dest = cx.arena.child(vertex, 0);
    if let Some(dest) = dest {
        if cx.arena[dest].is(Kind::Tuple) && cx.arena.num_children(dest) >= 1 {
            let expr = cx.arena.child_req(vertex, 1);
            if cx.arena.num_children(dest) != cx.arena.num_children(expr) {
                ice!("source and destination have different cardinality");
            }
            let line = cx.arena[vertex].line;
            let mut last: Option<NodeId> = None;
            for i in 0..cx.arena.num_children(dest) {
                let scalar_dest = cx.arena.child_req(dest, i);
                let scalar_src = cx.arena.child_req(expr, i);
                let new_assign = cx.make_assignment(Some(scalar_dest), scalar_src, line);
                graph.add_vertex(new_assign);
                match last {
                    Some(last) => graph.add_edge(last, new_assign, EdgeKind::empty()),
                    None => graph.replace_backward(vertex, new_assign, EdgeKind::empty()),
                }
                last = Some(new_assign);
            }
            graph.replace_forward(vertex, last, EdgeKind::empty());
            graph.remove_vertex(vertex);
            changed = true;
        }
    }

    changed
}
